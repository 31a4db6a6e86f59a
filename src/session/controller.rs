use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use time::OffsetDateTime;
use tokio::sync::watch;
use url::Url;

use super::options::SessionOptions;
use super::state::{SessionAction, SessionState, SessionStatus, reduce};
use crate::callback::has_auth_params;
use crate::client::FuroClient;
use crate::error::Error;
use crate::location::Location;
use crate::storage::KeyValueStore;
use crate::token;
use crate::types::{AppState, AuthorizeOptions, LogoutOptions, RedirectResult, TokenResponse, User};

/// Owns the observable session and forwards imperative operations to the client.
///
/// Construct once and share by reference (or `Arc`) with whatever UI layer
/// consumes it. Operations called before [`initialize`](Self::initialize)
/// finishes see a `Loading` state.
pub struct SessionController<S, L> {
    client: Arc<FuroClient<S, L>>,
    options: SessionOptions,
    state: watch::Sender<SessionState>,
    initialized: AtomicBool,
    disposed: AtomicBool,
}

impl<S: KeyValueStore, L: Location> SessionController<S, L> {
    #[must_use]
    pub fn new(client: Arc<FuroClient<S, L>>, options: SessionOptions) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            client,
            options,
            state,
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<FuroClient<S, L>> {
        &self.client
    }

    /// Snapshot of the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status()
    }

    /// Watch session state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Tear the controller down. Later state updates are dropped.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn dispatch(&self, action: SessionAction) {
        if self.is_disposed() {
            tracing::trace!(?action, "Controller disposed, dropping session update");
            return;
        }
        self.state.send_modify(|state| *state = reduce(state, action));
    }

    // ── Initialization ─────────────────────────────────────────────────

    /// Run the mount-time sequence: handle a pending redirect, otherwise
    /// restore the stored session, then publish the terminal state.
    ///
    /// Runs once per controller; later calls return the current status.
    /// Failures land in [`SessionState::error`].
    pub async fn initialize(&self) -> SessionStatus {
        if self.initialized.swap(true, Ordering::AcqRel) {
            tracing::debug!("Session already initialized");
            return self.status();
        }

        if let Err(error) = self.run_initialization().await {
            tracing::error!(error = %error, "Furo session initialization failed");
            self.dispatch(SessionAction::Error(error));
        }
        self.status()
    }

    async fn run_initialization(&self) -> Result<(), Error> {
        let search = self.client.location().search();

        if has_auth_params(&search) && !self.options.skip_redirect_callback {
            let result = self.client.handle_redirect_callback(Some(search.as_str())).await?;
            self.on_redirect(&result.app_state);
        } else {
            tracing::debug!("No redirect parameters, restoring session from storage");
        }

        let user = self.fetch_user_with_refresh().await?;
        if user.is_none() {
            self.client.clear_local_session().await?;
        }
        tracing::info!(authenticated = user.is_some(), "Furo session initialized");
        self.dispatch(SessionAction::Initialised { user });
        Ok(())
    }

    /// One silent renewal and one retry if the first fetch fails.
    async fn fetch_user_with_refresh(&self) -> Result<Option<User>, Error> {
        match self.client.get_user().await {
            Ok(user) => Ok(user),
            Err(error) => {
                tracing::warn!(error = %error, "User fetch failed, renewing token once");
                self.client.refresh_token_silently().await?;
                self.client.get_user().await
            }
        }
    }

    fn on_redirect(&self, app_state: &AppState) {
        if let Some(callback) = &self.options.on_redirect_callback {
            callback(app_state);
            return;
        }
        let location = self.client.location();
        let path = app_state
            .return_to
            .clone()
            .unwrap_or_else(|| location.pathname());
        location.replace_state(&path);
        location.assign(self.client.config().redirect_uri().as_str());
    }

    // ── Operations ─────────────────────────────────────────────────────

    /// See [`FuroClient::build_authorize_url`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the URL cannot be built.
    pub fn build_authorize_url(&self, options: &AuthorizeOptions) -> Result<Url, Error> {
        self.client.build_authorize_url(options)
    }

    /// See [`FuroClient::build_logout_url`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the URL cannot be built.
    pub fn build_logout_url(&self, options: &LogoutOptions) -> Result<Url, Error> {
        self.client.build_logout_url(options)
    }

    /// See [`FuroClient::login_with_redirect`].
    ///
    /// # Errors
    ///
    /// Returns the client's failure.
    pub async fn login_with_redirect(&self, options: &AuthorizeOptions) -> Result<(), Error> {
        self.client.login_with_redirect(options).await
    }

    /// See [`FuroClient::login_with_kakao`].
    ///
    /// # Errors
    ///
    /// Returns the client's failure.
    pub async fn login_with_kakao(&self, options: &AuthorizeOptions) -> Result<(), Error> {
        self.client.login_with_kakao(options).await
    }

    /// See [`FuroClient::refresh_token_silently`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoginRequired`] if no renewable session exists.
    pub async fn refresh_token_silently(&self) -> Result<TokenResponse, Error> {
        self.client.refresh_token_silently().await
    }

    /// Clear the stored token and user, then publish an unauthenticated state.
    ///
    /// The state changes even when remote termination fails; that failure is
    /// still returned.
    ///
    /// # Errors
    ///
    /// Returns the client's storage or remote logout failure.
    pub async fn logout(&self, options: &LogoutOptions) -> Result<(), Error> {
        let result = self.client.logout(options).await;
        self.dispatch(SessionAction::Logout);
        result
    }

    /// The stored access token, renewed first if its `exp` has passed.
    ///
    /// Opaque tokens and tokens without `exp` are returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error::NoSession`] if no token is stored
    /// - [`Error::Token`] if a structured token cannot be decoded
    /// - the renewal's failure if the token had expired
    pub async fn get_access_token_silently(&self) -> Result<String, Error> {
        let Some(access_token) = self.client.stored_token().await? else {
            return Err(Error::NoSession);
        };
        if !token::is_expired(&access_token, OffsetDateTime::now_utc())? {
            return Ok(access_token);
        }

        tracing::debug!("Access token expired, renewing");
        Ok(self.refresh_token_silently().await?.access_token)
    }

    /// Handle a redirect explicitly, then refresh the published user.
    ///
    /// The state is updated whether or not the callback succeeded; the
    /// callback's own error takes precedence in the return value.
    ///
    /// # Errors
    ///
    /// Returns the callback failure, or the user fetch failure after a
    /// successful callback.
    pub async fn handle_redirect_callback(&self, url: Option<&str>) -> Result<RedirectResult, Error> {
        let result = self.client.handle_redirect_callback(url).await;

        match self.client.get_user().await {
            Ok(user) => {
                self.dispatch(SessionAction::HandleRedirectComplete { user });
                result
            }
            Err(error) => {
                self.dispatch(SessionAction::Error(error.clone()));
                result.and(Err(error))
            }
        }
    }
}
