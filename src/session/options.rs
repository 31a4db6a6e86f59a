use std::fmt;
use std::sync::Arc;

use crate::types::AppState;

/// Invoked after a redirect callback has been handled on mount.
pub type RedirectCallback = Arc<dyn Fn(&AppState) + Send + Sync>;

/// Session controller options.
///
/// The default post-redirect behaviour replaces the current history entry
/// with `app_state.return_to` (or the current path, which drops the
/// redirect parameters) and then navigates to the configured redirect URI.
#[derive(Clone, Default)]
pub struct SessionOptions {
    pub(super) skip_redirect_callback: bool,
    pub(super) on_redirect_callback: Option<RedirectCallback>,
}

impl SessionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave redirect parameters alone on mount, e.g. when another library
    /// owns the callback route.
    #[must_use]
    pub fn with_skip_redirect_callback(mut self, skip: bool) -> Self {
        self.skip_redirect_callback = skip;
        self
    }

    /// Replace the default post-redirect behaviour.
    #[must_use]
    pub fn with_on_redirect_callback(
        mut self,
        callback: impl Fn(&AppState) + Send + Sync + 'static,
    ) -> Self {
        self.on_redirect_callback = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("skip_redirect_callback", &self.skip_redirect_callback)
            .field("on_redirect_callback", &self.on_redirect_callback.is_some())
            .finish()
    }
}
