use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::StatusCode;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use url::Url;

use crate::callback::RedirectParams;
use crate::config::{CacheLocation, CodeExchange, Config};
use crate::error::Error;
use crate::location::Location;
use crate::storage::{KeyValueStore, StorageKeys};
use crate::token;
use crate::types::{AppState, AuthorizeOptions, LogoutOptions, RedirectResult, TokenResponse, User};

/// Furo authentication client.
///
/// Owns the configuration and talks to the identity service and to the
/// injected stores. Tokens are never held in memory between calls; every
/// read goes back to the store.
pub struct FuroClient<S, L> {
    config: Config,
    keys: StorageKeys,
    local: S,
    session: S,
    location: L,
    http: reqwest::Client,
    refresh: Mutex<RefreshGate>,
    refresh_generation: AtomicU64,
}

/// Outcome of the most recent silent renewal, shared with callers that
/// queued up behind it.
#[derive(Default)]
struct RefreshGate {
    generation: u64,
    last: Option<Result<TokenResponse, Error>>,
}

impl<S: KeyValueStore, L: Location> FuroClient<S, L> {
    /// Create a client over a persistent store, a session-scoped store and
    /// the page location.
    #[must_use]
    pub fn new(config: Config, local: S, session: S, location: L) -> Self {
        let http = reqwest::Client::new();
        Self {
            keys: StorageKeys::new(&config.provider, &config.client_id),
            config,
            local,
            session,
            location,
            http,
            refresh: Mutex::new(RefreshGate::default()),
            refresh_generation: AtomicU64::new(0),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    #[must_use]
    pub fn location(&self) -> &L {
        &self.location
    }

    /// Persistent store (`localStorage`).
    #[must_use]
    pub fn local_store(&self) -> &S {
        &self.local
    }

    /// Session-scoped store (`sessionStorage`).
    #[must_use]
    pub fn session_store(&self) -> &S {
        &self.session
    }

    // ── URLs ───────────────────────────────────────────────────────────

    /// Build the login URL. Pure: no storage or network access.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the configured domain cannot carry a path.
    pub fn build_authorize_url(&self, options: &AuthorizeOptions) -> Result<Url, Error> {
        let mut segments = vec!["login", self.config.client_id.as_str()];
        if let Some(connection) = &options.connection {
            segments.push(connection.as_str());
        }
        let mut url = self.domain_url(&segments)?;

        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(redirect_uri) = &options.redirect_uri {
            pairs.push(("redirect_uri", redirect_uri.clone()));
        }
        if let Some(max_age) = self.config.max_age {
            pairs.push(("max_age", max_age.to_string()));
        }
        if let Some(return_to) = &options.app_state.return_to {
            pairs.push(("return_to", return_to.clone()));
        }
        for (key, value) in &options.extra_params {
            pairs.push((key.as_str(), value.clone()));
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }

    /// Build the identity service logout URL. Pure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the configured domain cannot carry a path.
    pub fn build_logout_url(&self, options: &LogoutOptions) -> Result<Url, Error> {
        let mut url = self.domain_url(&["logout", self.config.client_id.as_str()])?;
        let return_to = options
            .return_to
            .as_deref()
            .unwrap_or(self.config.redirect_uri.as_str());
        url.query_pairs_mut().append_pair("return_to", return_to);
        Ok(url)
    }

    fn domain_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.config.domain.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| {
                Error::Configuration(format!("domain cannot be a base: {}", self.config.domain))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ── Login ──────────────────────────────────────────────────────────

    /// Navigate to the login page. The flow resumes on the next load through
    /// [`handle_redirect_callback`](Self::handle_redirect_callback), which
    /// hands back the `app_state` saved here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the authorize URL cannot be built, or
    /// [`Error::Storage`] if the app state cannot be saved.
    pub async fn login_with_redirect(&self, options: &AuthorizeOptions) -> Result<(), Error> {
        let url = self.build_authorize_url(options)?;
        if options.app_state != AppState::default() {
            let app_state = serde_json::to_string(&options.app_state)?;
            store_set(&self.session, &self.keys.app_state, &app_state).await?;
        }
        tracing::info!(url = %url, "Redirecting to Furo login");
        self.location.assign(url.as_str());
        Ok(())
    }

    /// [`login_with_redirect`](Self::login_with_redirect) straight into Kakao login.
    ///
    /// # Errors
    ///
    /// Same as [`login_with_redirect`](Self::login_with_redirect).
    pub async fn login_with_kakao(&self, options: &AuthorizeOptions) -> Result<(), Error> {
        self.login_with_redirect(&options.clone().with_connection("kakao"))
            .await
    }

    // ── Callback ───────────────────────────────────────────────────────

    /// Complete a login redirect: parse the parameters, exchange the code and
    /// persist the resulting token.
    ///
    /// `url` defaults to the current location's query string. A code is
    /// exchanged at most once; replaying it fails instead of retrying.
    ///
    /// # Errors
    ///
    /// - [`Error::Authorization`] if the redirect carries an `error`
    /// - [`Error::MissingAuthParams`] if it carries neither `code` nor `uid`
    /// - [`Error::ExchangeFailed`] if the code is missing, already used or rejected
    /// - [`Error::Http`] / [`Error::Storage`] on transport or store failure
    pub async fn handle_redirect_callback(&self, url: Option<&str>) -> Result<RedirectResult, Error> {
        let search = match url {
            Some(url) => url.to_owned(),
            None => self.location.search(),
        };
        let params = RedirectParams::parse(&search);

        if let Some(error) = params.error {
            tracing::warn!(error = %error, description = ?params.error_description, "Furo redirected with an error");
            return Err(Error::Authorization {
                error,
                description: params.error_description,
            });
        }

        let code = match (params.code, params.uid.as_deref()) {
            (Some(code), _) => code,
            (None, Some(_)) => {
                return Err(Error::ExchangeFailed {
                    reason: "redirect carried uid without an authorization code".into(),
                });
            }
            (None, None) => return Err(Error::MissingAuthParams),
        };

        let consumed = store_get(&self.session, &self.keys.consumed_code).await?;
        if consumed.as_deref() == Some(code.as_str()) {
            tracing::warn!("Authorization code replayed");
            return Err(Error::ExchangeFailed {
                reason: "authorization code already used".into(),
            });
        }

        let tokens = self.exchange_code(&code, params.uid.as_deref()).await?;
        self.persist_tokens(&tokens).await?;
        store_set(&self.session, &self.keys.consumed_code, &code).await?;
        let app_state = self.take_app_state().await?;

        tracing::info!(uid = ?params.uid, "Furo redirect callback handled");
        Ok(RedirectResult {
            uid: params.uid,
            app_state,
            tokens,
        })
    }

    async fn take_app_state(&self) -> Result<AppState, Error> {
        let Some(json) = store_get(&self.session, &self.keys.app_state).await? else {
            return Ok(AppState::default());
        };
        store_remove(&self.session, &self.keys.app_state).await?;
        Ok(serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding unreadable app state");
            AppState::default()
        }))
    }

    async fn exchange_code(&self, code: &str, uid: Option<&str>) -> Result<TokenResponse, Error> {
        match self.config.code_exchange {
            CodeExchange::Passthrough => Ok(TokenResponse::bearer(code)),
            CodeExchange::TokenEndpoint => {
                let mut params = vec![
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("client_id", self.config.client_id.as_str()),
                    ("redirect_uri", self.config.redirect_uri.as_str()),
                ];
                if let Some(uid) = uid {
                    params.push(("uid", uid));
                }

                let response = self
                    .http
                    .post(self.config.api_endpoint("oauth/token")?)
                    .form(&params)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    tracing::error!(status = status.as_u16(), "Token exchange rejected");
                    return Err(Error::ExchangeFailed {
                        reason: format!("status {}: {body}", status.as_u16()),
                    });
                }
                response.json::<TokenResponse>().await.map_err(Into::into)
            }
        }
    }

    // ── User ───────────────────────────────────────────────────────────

    /// Fetch the current user profile.
    ///
    /// Returns `Ok(None)` without any request when no token is stored, and
    /// `Ok(None)` when the service answers 401.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] on other non-success statuses, [`Error::Http`]
    /// on transport failure.
    pub async fn get_user(&self) -> Result<Option<User>, Error> {
        let Some(access_token) = self.stored_token().await? else {
            tracing::debug!("No stored token, skipping user fetch");
            return Ok(None);
        };

        let response = self
            .http
            .get(self.config.api_endpoint("users/me")?)
            .bearer_auth(&access_token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!("Stored token rejected by userinfo endpoint");
            return Ok(None);
        }

        let response = Self::ensure_success(response, "userinfo request").await?;
        let user = response.json::<User>().await?;
        store_set(&self.local, &self.keys.user, &serde_json::to_string(&user)?).await?;
        Ok(Some(user))
    }

    /// User persisted by the last successful [`get_user`](Self::get_user).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] or [`Error::Serialization`] if the entry
    /// cannot be read back.
    pub async fn stored_user(&self) -> Result<Option<User>, Error> {
        store_get(&self.local, &self.keys.user)
            .await?
            .map(|json| serde_json::from_str(&json).map_err(Into::into))
            .transpose()
    }

    // ── Tokens ─────────────────────────────────────────────────────────

    /// The persisted access token: client-scoped entry first, then the
    /// generic one. Both are read from the configured cache store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a store fails.
    pub async fn stored_token(&self) -> Result<Option<String>, Error> {
        let store = self.cache_store();
        if let Some(token) = store_get(store, &self.keys.client_token).await? {
            return Ok(Some(token));
        }
        store_get(store, &self.keys.token).await
    }

    /// Return a usable access token, renewing it silently when it is missing
    /// or expired.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LoginRequired`] if no renewable session exists, or the
    /// renewal's own failure.
    pub async fn get_token_silently(&self) -> Result<String, Error> {
        if let Some(access_token) = self.stored_token().await? {
            if !token::is_expired(&access_token, OffsetDateTime::now_utc())? {
                return Ok(access_token);
            }
            tracing::debug!("Stored token expired, renewing");
        }
        Ok(self.refresh_token_silently().await?.access_token)
    }

    /// Renew the access token with the stored refresh token.
    ///
    /// Single-flight: one renewal runs at a time, and callers that were
    /// waiting while it ran get its outcome instead of starting another.
    ///
    /// # Errors
    ///
    /// - [`Error::LoginRequired`] if no refresh token is stored or the service rejects it
    /// - [`Error::Network`] / [`Error::Http`] on other failures
    pub async fn refresh_token_silently(&self) -> Result<TokenResponse, Error> {
        let observed = self.refresh_generation.load(Ordering::Acquire);
        let mut gate = self.refresh.lock().await;

        if gate.generation != observed {
            if let Some(outcome) = &gate.last {
                tracing::trace!("Joining in-flight token renewal");
                return outcome.clone();
            }
        }

        let outcome = self.renew_session().await;
        gate.generation += 1;
        gate.last = Some(outcome.clone());
        self.refresh_generation.store(gate.generation, Ordering::Release);
        outcome
    }

    async fn renew_session(&self) -> Result<TokenResponse, Error> {
        let Some(refresh_token) = store_get(self.cache_store(), &self.keys.refresh_token).await? else {
            tracing::debug!("No refresh token stored, login required");
            return Err(Error::LoginRequired);
        };

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];

        let response = self
            .http
            .post(self.config.api_endpoint("oauth/token")?)
            .form(&params)
            .send()
            .await?;

        if matches!(response.status(), StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) {
            tracing::warn!(status = response.status().as_u16(), "Refresh token rejected");
            store_remove(self.cache_store(), &self.keys.refresh_token).await?;
            return Err(Error::LoginRequired);
        }

        let response = Self::ensure_success(response, "token refresh").await?;
        let tokens = response.json::<TokenResponse>().await?;
        self.persist_tokens(&tokens).await?;

        tracing::info!("Furo token renewed");
        Ok(tokens)
    }

    /// Every credential lands in the cache store, so `CacheLocation::Session`
    /// leaves nothing behind in the persistent store.
    async fn persist_tokens(&self, tokens: &TokenResponse) -> Result<(), Error> {
        let store = self.cache_store();
        store_set(store, &self.keys.token, &tokens.access_token).await?;
        store_set(store, &self.keys.client_token, &tokens.access_token).await?;
        if let Some(refresh_token) = &tokens.refresh_token {
            store_set(store, &self.keys.refresh_token, refresh_token).await?;
        }
        Ok(())
    }

    fn cache_store(&self) -> &S {
        match self.config.cache_location {
            CacheLocation::Local => &self.local,
            CacheLocation::Session => &self.session,
        }
    }

    // ── Logout ─────────────────────────────────────────────────────────

    /// Remove the persisted token and user.
    ///
    /// Terminates the remote session only when configured with
    /// [`Config::with_remote_logout`] and `options.local_only` is false. The
    /// local entries are cleared first either way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if clearing fails, or the remote logout failure.
    pub async fn logout(&self, options: &LogoutOptions) -> Result<(), Error> {
        let remote_token = if self.config.remote_logout && !options.local_only {
            self.stored_token().await?
        } else {
            None
        };

        self.clear_local_session().await?;

        if let Some(access_token) = remote_token {
            let response = self
                .http
                .post(self.config.api_endpoint("sessions/logout")?)
                .bearer_auth(&access_token)
                .send()
                .await?;
            Self::ensure_success(response, "remote logout").await?;
        }

        tracing::info!(client_id = %self.config.client_id, "Furo logout complete");
        Ok(())
    }

    /// Remove every persisted credential for this client without any network call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a store fails.
    pub async fn clear_local_session(&self) -> Result<(), Error> {
        store_remove(&self.local, &self.keys.user).await?;
        for store in [&self.local, &self.session] {
            store_remove(store, &self.keys.token).await?;
            store_remove(store, &self.keys.client_token).await?;
            store_remove(store, &self.keys.refresh_token).await?;
        }
        Ok(())
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Network {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

async fn store_get<S: KeyValueStore>(store: &S, key: &str) -> Result<Option<String>, Error> {
    store.get(key).await.map_err(|e| Error::Storage(e.to_string()))
}

async fn store_set<S: KeyValueStore>(store: &S, key: &str, value: &str) -> Result<(), Error> {
    tracing::trace!(key, "Store write");
    store
        .set(key, value)
        .await
        .map_err(|e| Error::Storage(e.to_string()))
}

async fn store_remove<S: KeyValueStore>(store: &S, key: &str) -> Result<(), Error> {
    store.remove(key).await.map_err(|e| Error::Storage(e.to_string()))
}
