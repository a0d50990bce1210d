//! Authentication and authorization error types.

use std::fmt;

/// Result alias used throughout the auth crate.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors produced by the authorization chain and its collaborators.
///
/// The first four variants are the deny reasons of the chain itself and
/// determine how a denial is presented to the client: unauthenticated
/// denials (including invalid sessions) redirect to the login entry point,
/// while role and organization denials render an access-denied response.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No identity is attached to the request, or it is not authenticated.
    #[error("Unauthenticated: {message}")]
    Unauthenticated {
        /// Description of what was missing.
        message: String,
    },

    /// A session token claim is present but the session store has no
    /// matching live session.
    #[error("Session invalid: {message}")]
    SessionInvalid {
        /// Description of why the session is invalid.
        message: String,
    },

    /// The authenticated identity does not hold a required role.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of the failed role check.
        message: String,
    },

    /// The operation requires a current organization and none is selected.
    #[error("No organization selected: {message}")]
    NoOrganizationSelected {
        /// Description of the failed check.
        message: String,
    },

    /// The session store failed while looking up or mutating a session.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Unauthenticated` error.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Creates a new `SessionInvalid` error.
    #[must_use]
    pub fn session_invalid(message: impl Into<String>) -> Self {
        Self::SessionInvalid {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `NoOrganizationSelected` error.
    #[must_use]
    pub fn no_organization_selected(message: impl Into<String>) -> Self {
        Self::NoOrganizationSelected {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the denial should be presented as "not logged in"
    /// (login redirect) rather than "logged in but not allowed".
    ///
    /// An invalid session counts as unauthenticated: the cookie the client
    /// holds no longer corresponds to a live session, so the only useful
    /// next step is to log in again.
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated { .. } | Self::SessionInvalid { .. }
        )
    }

    /// Returns `true` if the identity was valid but lacked permission.
    #[must_use]
    pub fn is_authorization_error(&self) -> bool {
        matches!(
            self,
            Self::Forbidden { .. } | Self::NoOrganizationSelected { .. }
        )
    }

    /// Returns `true` if this is a server-side failure rather than a
    /// client denial.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthenticated { .. } => ErrorCategory::Authentication,
            Self::SessionInvalid { .. } => ErrorCategory::Authentication,
            Self::Forbidden { .. } => ErrorCategory::Authorization,
            Self::NoOrganizationSelected { .. } => ErrorCategory::Authorization,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of auth errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Identity verification failures.
    Authentication,
    /// Permission check failures.
    Authorization,
    /// Session store failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::unauthenticated("no identity attached");
        assert_eq!(err.to_string(), "Unauthenticated: no identity attached");

        let err = AuthError::session_invalid("no session for token");
        assert_eq!(err.to_string(), "Session invalid: no session for token");

        let err = AuthError::forbidden("role 'member' not in [owner]");
        assert_eq!(err.to_string(), "Forbidden: role 'member' not in [owner]");
    }

    #[test]
    fn test_error_predicates() {
        let err = AuthError::unauthenticated("test");
        assert!(err.is_authentication_error());
        assert!(!err.is_authorization_error());
        assert!(!err.is_server_error());

        // An invalid session presents as unauthenticated, never forbidden.
        let err = AuthError::session_invalid("test");
        assert!(err.is_authentication_error());
        assert!(!err.is_authorization_error());

        let err = AuthError::forbidden("test");
        assert!(!err.is_authentication_error());
        assert!(err.is_authorization_error());

        let err = AuthError::no_organization_selected("test");
        assert!(err.is_authorization_error());

        let err = AuthError::storage("store down");
        assert!(err.is_server_error());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            AuthError::unauthenticated("x").category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            AuthError::forbidden("x").category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            AuthError::storage("x").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(ErrorCategory::Authentication.to_string(), "authentication");
    }
}
