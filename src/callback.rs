use url::form_urlencoded;

/// Authorization parameters carried by a redirect back from the identity service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectParams {
    pub code: Option<String>,
    pub uid: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl RedirectParams {
    /// Parse from a query string (`?code=..`), a bare query (`code=..`), a
    /// full URL or a path. Empty values count as absent.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in form_urlencoded::parse(query_part(input).as_bytes()) {
            if value.is_empty() {
                continue;
            }
            let slot = match &*key {
                "code" => &mut params.code,
                "uid" => &mut params.uid,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            // First occurrence wins, as with URLSearchParams::get.
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }

    /// `code` or `error` is present.
    #[must_use]
    pub fn has_auth_params(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

/// Whether `search` carries a redirect that should be handled.
#[must_use]
pub fn has_auth_params(search: &str) -> bool {
    RedirectParams::parse(search).has_auth_params()
}

fn query_part(input: &str) -> &str {
    let without_fragment = input.split_once('#').map_or(input, |(head, _)| head);
    match without_fragment.split_once('?') {
        Some((_, query)) => query,
        None if without_fragment.contains('=') => without_fragment,
        None => "",
    }
}
