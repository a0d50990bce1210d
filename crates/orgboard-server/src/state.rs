//! Shared application state.

use std::sync::Arc;

use orgboard_auth::SessionStore;

use crate::cache::ResponseCache;
use crate::config::AppConfig;

/// State shared by handlers and middleware.
///
/// Everything request-scoped (claims, authorized context, cache keys,
/// timers) lives in request extensions or middleware locals, never here:
/// this struct is shared across all in-flight requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<dyn SessionStore>,
    pub cache: Arc<dyn ResponseCache>,
}

impl AppState {
    /// Assembles state from configuration and collaborators.
    #[must_use]
    pub fn new(
        config: AppConfig,
        sessions: Arc<dyn SessionStore>,
        cache: Arc<dyn ResponseCache>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sessions,
            cache,
        }
    }
}
