use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// User profile returned by `GET /users/me`.
///
/// Opaque: the shape is whatever the identity service returns. Stored and
/// removed as a whole, never partially updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct User(Map<String, JsonValue>);

impl User {
    /// Look up a profile field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// String-valued profile field.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(JsonValue::as_str)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }
}

/// Application state carried across the login redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct AppState {
    /// Path to show once the redirect has been handled.
    #[serde(default, alias = "returnTo")]
    pub return_to: Option<String>,
}

impl AppState {
    #[must_use]
    pub fn returning_to(path: impl Into<String>) -> Self {
        Self {
            return_to: Some(path.into()),
        }
    }
}

/// Options for building the authorize URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct AuthorizeOptions {
    /// Overrides the configured redirect URI for this login.
    pub redirect_uri: Option<String>,
    pub app_state: AppState,
    /// Social connection to log in with directly (e.g. `kakao`).
    pub connection: Option<String>,
    /// Additional query parameters, appended in the order they were added.
    pub extra_params: Vec<(String, String)>,
}

impl AuthorizeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn with_app_state(mut self, app_state: AppState) -> Self {
        self.app_state = app_state;
        self
    }

    #[must_use]
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.push((key.into(), value.into()));
        self
    }
}

/// Options for logout and the logout URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct LogoutOptions {
    /// Where the identity service sends the browser after logout.
    pub return_to: Option<String>,
    /// Skip remote session termination even if it is configured.
    pub local_only: bool,
}

impl LogoutOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_return_to(mut self, return_to: impl Into<String>) -> Self {
        self.return_to = Some(return_to.into());
        self
    }

    #[must_use]
    pub fn local_only(mut self) -> Self {
        self.local_only = true;
        self
    }
}

/// Token response from the Furo token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// A bare access token with no refresh token.
    #[must_use]
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: Some("Bearer".into()),
            expires_in: None,
            refresh_token: None,
        }
    }
}

/// Result of a handled redirect callback.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct RedirectResult {
    /// `uid` parameter from the redirect, if any.
    pub uid: Option<String>,
    /// State saved by the login that started this redirect.
    pub app_state: AppState,
    pub tokens: TokenResponse,
}
