//! Authentication configuration.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Configuration for the cookie-borne claims and the deny presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Name of the cookie carrying the encoded claim set.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Path unauthenticated requests are redirected to. The original
    /// request path is appended as a `return_to` query parameter.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Default session lifetime in seconds, used when creating sessions.
    #[serde(default = "default_session_ttl_seconds")]
    pub session_ttl_seconds: u64,
}

fn default_cookie_name() -> String {
    "orgboard_identity".into()
}
fn default_login_path() -> String {
    "/auth/login".into()
}
fn default_session_ttl_seconds() -> u64 {
    8 * 60 * 60
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            login_path: default_login_path(),
            session_ttl_seconds: default_session_ttl_seconds(),
        }
    }
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for empty names or a login path that
    /// is not absolute.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.cookie_name.is_empty() {
            return Err(AuthError::configuration("cookie_name must not be empty"));
        }
        if !self.login_path.starts_with('/') {
            return Err(AuthError::configuration("login_path must start with '/'"));
        }
        if self.session_ttl_seconds == 0 {
            return Err(AuthError::configuration(
                "session_ttl_seconds must be > 0",
            ));
        }
        Ok(())
    }
}
