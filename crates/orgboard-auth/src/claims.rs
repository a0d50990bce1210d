//! Identity claims attached to an authenticated request.
//!
//! The upstream identity layer (cookie issuance, password verification)
//! is out of scope for this crate; it hands us a claim set per request.
//! Claims travel as a base64url-encoded JSON payload inside the session
//! cookie, and live for exactly one request once decoded.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// The claim set produced by the upstream identity layer.
///
/// Presence of a decoded `IdentityClaims` value means the request carried
/// an authenticated identity; absence means unauthenticated. All fields
/// except the session token are optional: a user may be logged in without
/// having selected an organization yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Opaque token identifying the stored session, checked for liveness
    /// by the authorization chain.
    #[serde(rename = "SessionToken")]
    pub session_token: String,

    /// The currently selected organization, if any.
    #[serde(rename = "OrganizationId", skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,

    /// The identity's role within the selected organization.
    #[serde(rename = "OrganizationRole", skip_serializing_if = "Option::is_none")]
    pub organization_role: Option<String>,

    /// A role that applies across all organizations (e.g. support staff).
    #[serde(rename = "GlobalRole", skip_serializing_if = "Option::is_none")]
    pub global_role: Option<String>,

    /// Display name for logging; not used in authorization decisions.
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl IdentityClaims {
    /// Creates a minimal claim set carrying only a session token.
    #[must_use]
    pub fn new(session_token: impl Into<String>) -> Self {
        Self {
            session_token: session_token.into(),
            organization_id: None,
            organization_role: None,
            global_role: None,
            display_name: None,
        }
    }

    /// Sets the organization context (id and scoped role).
    #[must_use]
    pub fn with_organization(mut self, id: Uuid, role: impl Into<String>) -> Self {
        self.organization_id = Some(id);
        self.organization_role = Some(role.into());
        self
    }

    /// Sets the global role.
    #[must_use]
    pub fn with_global_role(mut self, role: impl Into<String>) -> Self {
        self.global_role = Some(role.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Encodes the claim set as the cookie payload (base64url JSON).
    ///
    /// # Errors
    ///
    /// Returns an internal error if serialization fails.
    pub fn encode(&self) -> AuthResult<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| AuthError::internal(format!("claims serialization failed: {e}")))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decodes a cookie payload back into a claim set.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` if the payload is not valid base64url JSON;
    /// an undecodable cookie is treated as no identity at all.
    pub fn decode(payload: &str) -> AuthResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim())
            .map_err(|_| AuthError::unauthenticated("malformed claims cookie"))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| AuthError::unauthenticated("unparseable claims cookie"))
    }
}
