use serde::Deserialize;
use url::Url;

use crate::error::Error;

const DEFAULT_API_URL: &str = "https://api.furo.one";
const DEFAULT_PROVIDER: &str = "furo";

/// Which store holds the access and refresh tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheLocation {
    /// Durable across reloads (`localStorage`).
    #[default]
    Local,
    /// Scoped to the browsing session (`sessionStorage`).
    Session,
}

/// How an authorization code becomes an access token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CodeExchange {
    /// The service hands out the access token as the `code` parameter.
    #[default]
    Passthrough,
    /// `POST {api_url}/oauth/token` with `grant_type=authorization_code`.
    TokenEndpoint,
}

/// Loosely-typed client options, as an application passes them in.
///
/// Every field is optional here so that configuration files and JS-style
/// option bags deserialize cleanly. Validation happens in
/// [`Config::try_from`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientOptions {
    pub domain: Option<String>,
    #[serde(alias = "clientId")]
    pub client_id: Option<String>,
    #[serde(alias = "redirectUri")]
    pub redirect_uri: Option<String>,
    #[serde(default, alias = "apiUrl")]
    pub api_url: Option<String>,
    #[serde(default, alias = "maxAge")]
    pub max_age: Option<u64>,
}

/// Validated Furo client configuration.
///
/// ```rust,ignore
/// use furo_auth::Config;
///
/// let config = Config::new(
///     "https://auth.example.com".parse()?,
///     "my-client-id",
///     "https://my-app.com/callback".parse()?,
/// )?
/// .with_max_age(3600);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    pub(crate) domain: Url,
    pub(crate) client_id: String,
    pub(crate) redirect_uri: Url,
    pub(crate) api_url: Url,
    pub(crate) max_age: Option<u64>,
    pub(crate) cache_location: CacheLocation,
    pub(crate) code_exchange: CodeExchange,
    pub(crate) remote_logout: bool,
    pub(crate) provider: String,
}

impl Config {
    /// Create a configuration from the three required settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `client_id` is empty.
    pub fn new(domain: Url, client_id: impl Into<String>, redirect_uri: Url) -> Result<Self, Error> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(Error::Configuration("client_id is required".into()));
        }
        Ok(Self {
            domain,
            client_id,
            redirect_uri,
            api_url: DEFAULT_API_URL.parse().map_err(|e| {
                Error::Configuration(format!("default api_url: {e}"))
            })?,
            max_age: None,
            cache_location: CacheLocation::default(),
            code_exchange: CodeExchange::default(),
            remote_logout: false,
            provider: DEFAULT_PROVIDER.into(),
        })
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `FURO_DOMAIN`: identity service origin (must be a valid URL)
    /// - `FURO_CLIENT_ID`: client identifier
    /// - `FURO_REDIRECT_URI`: post-login redirect URI (must be a valid URL)
    ///
    /// # Optional env vars
    /// - `FURO_API_URL`: override the API base URL
    /// - `FURO_MAX_AGE`: maximum authentication age in seconds
    /// - `FURO_CACHE_LOCATION`: `local` or `session`
    /// - `FURO_CODE_EXCHANGE`: `passthrough` or `token-endpoint`
    /// - `FURO_REMOTE_LOGOUT`: `"1"` or `"true"` to terminate the remote session on logout
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if required vars are missing or any value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same rules as [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if required vars are missing or any value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let options = ClientOptions {
            domain: lookup("FURO_DOMAIN"),
            client_id: lookup("FURO_CLIENT_ID"),
            redirect_uri: lookup("FURO_REDIRECT_URI"),
            api_url: lookup("FURO_API_URL"),
            max_age: lookup("FURO_MAX_AGE")
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .map_err(|e| Error::Configuration(format!("FURO_MAX_AGE: {e}")))
                })
                .transpose()?,
        };
        let mut config = Self::try_from(options)?;

        if let Some(value) = lookup("FURO_CACHE_LOCATION") {
            config.cache_location = match value.trim().to_ascii_lowercase().as_str() {
                "local" => CacheLocation::Local,
                "session" => CacheLocation::Session,
                other => {
                    return Err(Error::Configuration(format!(
                        "FURO_CACHE_LOCATION: unknown value '{other}'"
                    )));
                }
            };
        }
        if let Some(value) = lookup("FURO_CODE_EXCHANGE") {
            config.code_exchange = match value.trim().to_ascii_lowercase().as_str() {
                "passthrough" => CodeExchange::Passthrough,
                "token-endpoint" | "token_endpoint" => CodeExchange::TokenEndpoint,
                other => {
                    return Err(Error::Configuration(format!(
                        "FURO_CODE_EXCHANGE: unknown value '{other}'"
                    )));
                }
            };
        }
        config.remote_logout = matches!(
            lookup("FURO_REMOTE_LOGOUT").as_deref(),
            Some("1") | Some("true"),
        );

        Ok(config)
    }

    /// Override the API base URL (default: `https://api.furo.one`).
    #[must_use]
    pub fn with_api_url(mut self, url: Url) -> Self {
        self.api_url = url;
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_cache_location(mut self, location: CacheLocation) -> Self {
        self.cache_location = location;
        self
    }

    #[must_use]
    pub fn with_code_exchange(mut self, exchange: CodeExchange) -> Self {
        self.code_exchange = exchange;
        self
    }

    /// Also terminate the session at the identity service on logout.
    #[must_use]
    pub fn with_remote_logout(mut self, enabled: bool) -> Self {
        self.remote_logout = enabled;
        self
    }

    /// Override the storage key prefix (default: `furo`).
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Identity service origin.
    #[must_use]
    pub fn domain(&self) -> &Url {
        &self.domain
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Where the service redirects after login.
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// API base URL for `/users/me` and the token endpoint.
    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    #[must_use]
    pub fn max_age(&self) -> Option<u64> {
        self.max_age
    }

    #[must_use]
    pub fn cache_location(&self) -> CacheLocation {
        self.cache_location
    }

    #[must_use]
    pub fn code_exchange(&self) -> CodeExchange {
        self.code_exchange
    }

    #[must_use]
    pub fn remote_logout(&self) -> bool {
        self.remote_logout
    }

    /// Storage key prefix.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Resolve a path against the API base URL, keeping any base path.
    pub(crate) fn api_endpoint(&self, path: &str) -> Result<Url, Error> {
        let mut url = self.api_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                Error::Configuration(format!("api_url cannot be a base: {}", self.api_url))
            })?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }
}

impl TryFrom<ClientOptions> for Config {
    type Error = Error;

    fn try_from(options: ClientOptions) -> Result<Self, Self::Error> {
        let domain = required_url("domain", options.domain)?;
        let client_id = options
            .client_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::Configuration("client_id is required".into()))?;
        let redirect_uri = required_url("redirect_uri", options.redirect_uri)?;

        let mut config = Self::new(domain, client_id, redirect_uri)?;
        if let Some(api_url) = options.api_url {
            let url = api_url
                .parse()
                .map_err(|e| Error::Configuration(format!("api_url: {e}")))?;
            config = config.with_api_url(url);
        }
        config.max_age = options.max_age;
        Ok(config)
    }
}

fn required_url(field: &str, value: Option<String>) -> Result<Url, Error> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Configuration(format!("{field} is required")))?;
    value
        .parse()
        .map_err(|e| Error::Configuration(format!("{field}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn full_options() -> ClientOptions {
        ClientOptions {
            domain: Some("https://auth.furo.one".into()),
            client_id: Some("client-1".into()),
            redirect_uri: Some("https://app.example.com/callback".into()),
            api_url: None,
            max_age: None,
        }
    }

    #[test]
    fn test_options_to_config() {
        let config = Config::try_from(full_options()).unwrap();

        assert_eq!(config.client_id(), "client-1");
        assert_eq!(config.domain().as_str(), "https://auth.furo.one/");
        assert_eq!(config.api_url().as_str(), "https://api.furo.one/");
        assert_eq!(config.provider(), "furo");
        assert_eq!(config.cache_location(), CacheLocation::Local);
        assert_eq!(config.code_exchange(), CodeExchange::Passthrough);
        assert!(!config.remote_logout());
    }

    #[test]
    fn test_missing_required_fields() {
        let cases: [fn(&mut ClientOptions); 3] = [
            |o| o.domain = None,
            |o| o.client_id = None,
            |o| o.redirect_uri = None,
        ];
        for clear in cases {
            let mut options = full_options();
            clear(&mut options);
            let err = Config::try_from(options).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
        }
    }

    #[test]
    fn test_blank_client_id_rejected() {
        let mut options = full_options();
        options.client_id = Some("  ".into());
        assert!(matches!(
            Config::try_from(options),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_domain_rejected() {
        let mut options = full_options();
        options.domain = Some("not a url".into());
        let err = Config::try_from(options).unwrap_err();
        assert!(err.to_string().contains("domain"));
    }

    #[test]
    fn test_camel_case_options() {
        let options: ClientOptions = serde_json::from_str(
            r#"{
                "domain": "https://auth.furo.one",
                "clientId": "abc",
                "redirectUri": "https://app.example.com",
                "apiUrl": "https://api.example.com",
                "maxAge": 60
            }"#,
        )
        .unwrap();
        let config = Config::try_from(options).unwrap();

        assert_eq!(config.client_id(), "abc");
        assert_eq!(config.api_url().as_str(), "https://api.example.com/");
        assert_eq!(config.max_age(), Some(60));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("FURO_DOMAIN", "https://auth.furo.one"),
            ("FURO_CLIENT_ID", "env-client"),
            ("FURO_REDIRECT_URI", "https://app.example.com/cb"),
            ("FURO_MAX_AGE", "120"),
            ("FURO_CACHE_LOCATION", "session"),
            ("FURO_CODE_EXCHANGE", "token-endpoint"),
            ("FURO_REMOTE_LOGOUT", "true"),
        ]);
        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.client_id(), "env-client");
        assert_eq!(config.max_age(), Some(120));
        assert_eq!(config.cache_location(), CacheLocation::Session);
        assert_eq!(config.code_exchange(), CodeExchange::TokenEndpoint);
        assert!(config.remote_logout());
    }

    #[test]
    fn test_from_lookup_missing_client_id() {
        let err = Config::from_lookup(|k| match k {
            "FURO_DOMAIN" => Some("https://auth.furo.one".into()),
            "FURO_REDIRECT_URI" => Some("https://app.example.com".into()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("client_id")));
    }

    #[test]
    fn test_api_endpoint_keeps_base_path() {
        let config = Config::try_from(ClientOptions {
            api_url: Some("https://gateway.example.com/furo/".into()),
            ..full_options()
        })
        .unwrap();

        assert_eq!(
            config.api_endpoint("/users/me").unwrap().as_str(),
            "https://gateway.example.com/furo/users/me"
        );
    }
}
