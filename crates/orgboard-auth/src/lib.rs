//! Authentication and authorization for Orgboard.
//!
//! This crate owns the request-scoped authorization chain: identity claims
//! attached by the upstream cookie layer are validated against stored
//! session state and checked against organization-scoped and global role
//! requirements. The HTTP wiring (middleware, redirects, response shapes)
//! lives in `orgboard-server`; everything here is transport-agnostic.

pub mod chain;
pub mod claims;
pub mod config;
pub mod error;
pub mod requirement;
pub mod session;

pub use chain::{AuthorizedContext, authorize};
pub use claims::IdentityClaims;
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult, ErrorCategory};
pub use requirement::{AuthorizationRequirement, roles};
pub use session::{MemorySessionStore, SessionRecord, SessionStore};
