use crate::error::Error;
use crate::types::User;

/// Observable session state.
///
/// Starts loading; only [`reduce`] produces new values.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SessionState {
    pub is_loading: bool,
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub error: Option<Error>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            is_loading: true,
            is_authenticated: false,
            user: None,
            error: None,
        }
    }
}

/// Coarse view of [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Authenticated,
    Unauthenticated,
    Errored,
}

impl SessionState {
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        if self.error.is_some() {
            SessionStatus::Errored
        } else if self.is_loading {
            SessionStatus::Loading
        } else if self.is_authenticated {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unauthenticated
        }
    }
}

/// State transitions dispatched by the controller.
#[derive(Debug, Clone)]
pub enum SessionAction {
    /// Mount-time initialization finished.
    Initialised { user: Option<User> },
    /// An explicit redirect callback was handled.
    HandleRedirectComplete { user: Option<User> },
    Logout,
    Error(Error),
}

/// Apply `action` to `state`.
#[must_use]
pub fn reduce(state: &SessionState, action: SessionAction) -> SessionState {
    match action {
        SessionAction::Initialised { user } | SessionAction::HandleRedirectComplete { user } => {
            SessionState {
                is_loading: false,
                is_authenticated: user.is_some(),
                user,
                error: None,
            }
        }
        SessionAction::Logout => SessionState {
            is_loading: false,
            is_authenticated: false,
            user: None,
            error: None,
        },
        SessionAction::Error(error) => SessionState {
            is_loading: false,
            error: Some(error),
            ..state.clone()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        serde_json::from_value(serde_json::json!({ "uid": "U1" })).unwrap()
    }

    #[test]
    fn initial_state_is_loading() {
        let state = SessionState::default();
        assert!(state.is_loading);
        assert!(!state.is_authenticated);
        assert_eq!(state.status(), SessionStatus::Loading);
    }

    #[test]
    fn initialised_with_user() {
        let state = reduce(
            &SessionState::default(),
            SessionAction::Initialised { user: Some(user()) },
        );
        assert_eq!(state.status(), SessionStatus::Authenticated);
        assert_eq!(state.user, Some(user()));
    }

    #[test]
    fn initialised_without_user() {
        let state = reduce(&SessionState::default(), SessionAction::Initialised { user: None });
        assert_eq!(state.status(), SessionStatus::Unauthenticated);
        assert!(!state.is_loading);
    }

    #[test]
    fn error_keeps_user_and_stops_loading() {
        let authenticated = reduce(
            &SessionState::default(),
            SessionAction::HandleRedirectComplete { user: Some(user()) },
        );
        let state = reduce(&authenticated, SessionAction::Error(Error::LoginRequired));

        assert_eq!(state.status(), SessionStatus::Errored);
        assert!(!state.is_loading);
        assert_eq!(state.user, Some(user()));
    }

    #[test]
    fn logout_clears_error_and_user() {
        let errored = reduce(&SessionState::default(), SessionAction::Error(Error::NoSession));
        let state = reduce(&errored, SessionAction::Logout);

        assert_eq!(state.status(), SessionStatus::Unauthenticated);
        assert!(state.user.is_none());
        assert!(state.error.is_none());
    }
}
