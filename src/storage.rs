use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

/// Boxed error returned by store implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Consumer-provided key/value persistence.
///
/// Stands in for `localStorage` / `sessionStorage`. Values are opaque
/// strings; the client serializes whatever it stores.
///
/// # Example
///
/// ```rust,ignore
/// impl KeyValueStore for BrowserStorage {
///     async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
///         Ok(self.storage.get_item(key).map_err(|e| format!("{e:?}"))?)
///     }
///
///     async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
///         self.storage.set_item(key, value).map_err(|e| format!("{e:?}").into())
///     }
///
///     async fn remove(&self, key: &str) -> Result<(), StoreError> {
///         self.storage.remove_item(key).map_err(|e| format!("{e:?}").into())
///     }
/// }
/// ```
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-process [`KeyValueStore`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing entries.
    #[must_use]
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Current value for `key`, read synchronously.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // Entries stay consistent even if a holder panicked mid-insert.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Storage key names for one provider/client pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// `<provider>-token`
    pub token: String,
    /// `<provider>-<client_id>-token`
    pub client_token: String,
    /// `<provider>-<client_id>-refresh-token`
    pub refresh_token: String,
    /// `<provider>-user`
    pub user: String,
    /// `<provider>-<client_id>-code`, the last authorization code exchanged.
    pub consumed_code: String,
    /// `<provider>-<client_id>-app-state`
    pub app_state: String,
}

impl StorageKeys {
    #[must_use]
    pub fn new(provider: &str, client_id: &str) -> Self {
        Self {
            token: format!("{provider}-token"),
            client_token: format!("{provider}-{client_id}-token"),
            refresh_token: format!("{provider}-{client_id}-refresh-token"),
            user: format!("{provider}-user"),
            consumed_code: format!("{provider}-{client_id}-code"),
            app_state: format!("{provider}-{client_id}-app-state"),
        }
    }
}
