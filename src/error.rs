use std::sync::Arc;

/// Errors surfaced by [`FuroClient`](crate::FuroClient) and
/// [`SessionController`](crate::SessionController).
///
/// `Clone` so a single renewal outcome can be handed to every coalesced
/// caller and kept in [`SessionState`](crate::SessionState).
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Missing or malformed client configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The redirect URL carried neither `code` nor `uid`.
    #[error("Missing authorization parameters in redirect URL")]
    MissingAuthParams,

    /// The identity service redirected back with an `error` parameter.
    #[error("Authorization failed: {error}")]
    Authorization {
        error: String,
        description: Option<String>,
    },

    /// The authorization code could not be exchanged for a token.
    #[error("Code exchange failed: {reason}")]
    ExchangeFailed { reason: String },

    /// The identity service answered with an unexpected status.
    #[error("{operation} failed (status {status:?}): {detail}")]
    Network {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(Arc<reqwest::Error>),

    /// No renewable session exists; the user has to log in interactively.
    #[error("Login required")]
    LoginRequired,

    /// No token is stored for this client.
    #[error("No active session")]
    NoSession,

    /// A structured token could not be decoded.
    #[error("Token error: {0}")]
    Token(String),

    /// The key/value store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// True when the consumer should send the user through interactive login.
    #[must_use]
    pub fn is_login_required(&self) -> bool {
        matches!(self, Self::LoginRequired | Self::NoSession)
    }

    /// True for any failure talking to the identity service, whether it
    /// answered with an error status or could not be reached at all.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Http(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(Arc::new(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_network() {
        let err = Error::Network {
            operation: "userinfo request",
            status: Some(500),
            detail: "boom".into(),
        };
        assert_eq!(err.to_string(), "userinfo request failed (status Some(500)): boom");
    }

    #[test]
    fn display_authorization() {
        let err = Error::Authorization {
            error: "access_denied".into(),
            description: None,
        };
        assert_eq!(err.to_string(), "Authorization failed: access_denied");
    }

    #[test]
    fn login_required_grouping() {
        assert!(Error::LoginRequired.is_login_required());
        assert!(Error::NoSession.is_login_required());
        assert!(!Error::MissingAuthParams.is_login_required());
    }

    #[test]
    fn network_grouping() {
        let err = Error::Network {
            operation: "remote logout",
            status: Some(502),
            detail: String::new(),
        };
        assert!(err.is_network());
        assert!(!Error::LoginRequired.is_network());
        assert!(!Error::Storage("full".into()).is_network());
    }

    #[test]
    fn error_is_send_sync_clone() {
        fn assert_bounds<T: Send + Sync + Clone + 'static>() {}
        assert_bounds::<Error>();
    }
}
