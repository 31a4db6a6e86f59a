use std::sync::{Mutex, PoisonError};

use url::Url;

/// Consumer-provided access to the current page location and history.
///
/// Stands in for `window.location` / `window.history` so the client can
/// run without a browser.
pub trait Location: Send + Sync + 'static {
    /// Full current URL.
    fn href(&self) -> String;

    /// Query string including the leading `?`, or empty.
    fn search(&self) -> String;

    fn pathname(&self) -> String;

    /// Full-page navigation to `url`.
    fn assign(&self, url: &str);

    /// Replace the current history entry without navigating.
    fn replace_state(&self, path: &str);
}

/// In-process [`Location`] that records navigations.
#[derive(Debug)]
pub struct MemoryLocation {
    inner: Mutex<LocationState>,
}

#[derive(Debug)]
struct LocationState {
    current: Url,
    navigations: Vec<String>,
    replacements: Vec<String>,
}

impl MemoryLocation {
    #[must_use]
    pub fn new(current: Url) -> Self {
        Self {
            inner: Mutex::new(LocationState {
                current,
                navigations: Vec::new(),
                replacements: Vec::new(),
            }),
        }
    }

    /// URLs passed to [`Location::assign`], oldest first.
    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    /// Paths passed to [`Location::replace_state`], oldest first.
    #[must_use]
    pub fn replacements(&self) -> Vec<String> {
        self.lock().replacements.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocationState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Location for MemoryLocation {
    fn href(&self) -> String {
        self.lock().current.to_string()
    }

    fn search(&self) -> String {
        self.lock()
            .current
            .query()
            .filter(|q| !q.is_empty())
            .map(|q| format!("?{q}"))
            .unwrap_or_default()
    }

    fn pathname(&self) -> String {
        self.lock().current.path().to_owned()
    }

    fn assign(&self, url: &str) {
        let mut state = self.lock();
        state.navigations.push(url.to_owned());
        if let Ok(next) = state.current.join(url) {
            state.current = next;
        }
    }

    fn replace_state(&self, path: &str) {
        let mut state = self.lock();
        state.replacements.push(path.to_owned());
        if let Ok(next) = state.current.join(path) {
            state.current = next;
        }
    }
}
