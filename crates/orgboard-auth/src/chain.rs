//! The layered authorization chain.
//!
//! Evaluation order, short-circuiting on the first failure:
//!
//! 1. base authentication (claims present)
//! 2. session liveness (token claim + session store lookup)
//! 3. organization role membership (if the requirement filters on it)
//! 4. global role membership (if the requirement filters on it)
//! 5. organization selected (if the requirement demands one)
//!
//! Apart from the single session lookup the evaluation is a pure function
//! of the claim set and the requirement: identical inputs always produce
//! identical outcomes.

use uuid::Uuid;

use crate::claims::IdentityClaims;
use crate::error::{AuthError, AuthResult};
use crate::requirement::AuthorizationRequirement;
use crate::session::SessionStore;

/// The context an allowed request carries forward.
///
/// Downstream consumers read the resolved organization (cache key
/// derivation, tenant isolation) and the display name (telemetry).
/// The value is cloned into request extensions; it never outlives the
/// request.
#[derive(Debug, Clone)]
pub struct AuthorizedContext {
    /// The session id confirmed live by the store.
    pub session_id: Uuid,
    /// The user the session belongs to.
    pub user_id: Uuid,
    /// The organization resolved during authorization, if one is selected.
    pub organization_id: Option<Uuid>,
    /// Display name carried over from the claims for logging.
    pub display_name: Option<String>,
}

/// Evaluates `requirement` against `claims`, consulting `sessions` for
/// liveness.
///
/// A store lookup failure is logged and treated identically to "session
/// not found": the caller sees `SessionInvalid` either way. The original
/// system did not distinguish a transient store outage from a genuinely
/// dead token, and this chain preserves that behavior.
///
/// # Errors
///
/// Returns the first failing check as a typed deny:
/// [`AuthError::Unauthenticated`], [`AuthError::SessionInvalid`],
/// [`AuthError::Forbidden`] or [`AuthError::NoOrganizationSelected`].
pub async fn authorize(
    claims: Option<&IdentityClaims>,
    requirement: &AuthorizationRequirement,
    sessions: &dyn SessionStore,
) -> AuthResult<AuthorizedContext> {
    // 1. Base authentication.
    let claims = claims.ok_or_else(|| AuthError::unauthenticated("no identity attached"))?;

    // 2. Session liveness. A missing token claim and a dead token both
    // mean the client must log in again.
    if claims.session_token.is_empty() {
        return Err(AuthError::unauthenticated("missing session token claim"));
    }
    let record = match sessions.lookup(&claims.session_token).await {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(error = %e, "session store lookup failed, treating as not found");
            None
        }
    };
    let record =
        record.ok_or_else(|| AuthError::session_invalid("no live session for token"))?;

    // 3. Organization role.
    if !requirement.organization_roles.is_empty() {
        let role = claims
            .organization_role
            .as_deref()
            .ok_or_else(|| AuthError::forbidden("no organization role claim"))?;
        if !requirement.allows_organization_role(role) {
            return Err(AuthError::forbidden(format!(
                "organization role '{role}' is not allowed"
            )));
        }
    }

    // 4. Global role.
    if !requirement.global_roles.is_empty() {
        let role = claims
            .global_role
            .as_deref()
            .ok_or_else(|| AuthError::forbidden("no global role claim"))?;
        if !requirement.allows_global_role(role) {
            return Err(AuthError::forbidden(format!(
                "global role '{role}' is not allowed"
            )));
        }
    }

    // 5. Organization selected.
    if requirement.requires_organization_selected && claims.organization_id.is_none() {
        return Err(AuthError::no_organization_selected(
            "operation requires a current organization",
        ));
    }

    Ok(AuthorizedContext {
        session_id: record.id,
        user_id: record.user_id,
        organization_id: claims.organization_id,
        display_name: claims.display_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::{MemorySessionStore, SessionRecord};

    async fn store_with(token: &str) -> MemorySessionStore {
        let store = MemorySessionStore::new();
        store
            .create(token, SessionRecord::new(Uuid::new_v4(), Duration::from_secs(60)))
            .await
            .unwrap();
        store
    }

    /// A store whose every lookup fails, standing in for an outage.
    struct BrokenStore;

    #[async_trait::async_trait]
    impl SessionStore for BrokenStore {
        async fn lookup(&self, _token: &str) -> AuthResult<Option<SessionRecord>> {
            Err(AuthError::storage("store unreachable"))
        }
        async fn create(&self, _token: &str, _record: SessionRecord) -> AuthResult<()> {
            Err(AuthError::storage("store unreachable"))
        }
        async fn delete(&self, _token: &str) -> AuthResult<()> {
            Err(AuthError::storage("store unreachable"))
        }
    }

    #[tokio::test]
    async fn test_allow_with_matching_org_role() {
        let store = store_with("tok1").await;
        let org = Uuid::new_v4();
        let claims = IdentityClaims::new("tok1").with_organization(org, "admin");
        let req = AuthorizationRequirement::admin();

        let ctx = authorize(Some(&claims), &req, &store).await.unwrap();
        assert_eq!(ctx.organization_id, Some(org));
    }

    #[tokio::test]
    async fn test_deny_unauthenticated() {
        let store = MemorySessionStore::new();
        let err = authorize(None, &AuthorizationRequirement::member(), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated { .. }));
    }

    #[tokio::test]
    async fn test_deny_dead_session() {
        let store = MemorySessionStore::new();
        let claims =
            IdentityClaims::new("unknown").with_organization(Uuid::new_v4(), "owner");
        let err = authorize(Some(&claims), &AuthorizationRequirement::owner(), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid { .. }));
        assert!(err.is_authentication_error());
    }

    #[tokio::test]
    async fn test_store_outage_is_treated_as_not_found() {
        let claims = IdentityClaims::new("tok1").with_organization(Uuid::new_v4(), "owner");
        let err = authorize(
            Some(&claims),
            &AuthorizationRequirement::owner(),
            &BrokenStore,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid { .. }));
    }

    #[tokio::test]
    async fn test_deny_forbidden_role_mismatch() {
        let store = store_with("tok1").await;
        let claims = IdentityClaims::new("tok1").with_organization(Uuid::new_v4(), "member");
        let err = authorize(Some(&claims), &AuthorizationRequirement::owner(), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { .. }));
        assert!(err.is_authorization_error());
    }

    #[tokio::test]
    async fn test_role_match_is_case_insensitive() {
        let store = store_with("tok1").await;
        let claims = IdentityClaims::new("tok1").with_organization(Uuid::new_v4(), "Owner");
        let req = AuthorizationRequirement::owner();
        assert!(authorize(Some(&claims), &req, &store).await.is_ok());
    }

    #[tokio::test]
    async fn test_deny_missing_org_role_claim() {
        let store = store_with("tok1").await;
        let claims = IdentityClaims::new("tok1");
        let err = authorize(Some(&claims), &AuthorizationRequirement::member(), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_global_role_check() {
        let store = store_with("tok1").await;
        let req = AuthorizationRequirement::authenticated().with_global_roles(["support"]);

        let claims = IdentityClaims::new("tok1").with_global_role("Support");
        assert!(authorize(Some(&claims), &req, &store).await.is_ok());

        let claims = IdentityClaims::new("tok1").with_global_role("billing");
        let err = authorize(Some(&claims), &req, &store).await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_org_selected_is_checked_after_roles() {
        let store = store_with("tok1").await;

        // Org role claim present but no selected org: the member preset
        // fails on the selection check, not the role check.
        let mut claims = IdentityClaims::new("tok1");
        claims.organization_role = Some("admin".to_string());
        let err = authorize(Some(&claims), &AuthorizationRequirement::member(), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NoOrganizationSelected { .. }));

        // The bare organization gate has no role filter at all.
        let claims = IdentityClaims::new("tok1");
        let err = authorize(
            Some(&claims),
            &AuthorizationRequirement::organization_selected(),
            &store,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::NoOrganizationSelected { .. }));
    }

    #[tokio::test]
    async fn test_authenticated_preset_needs_only_a_live_session() {
        let store = store_with("tok1").await;
        let claims = IdentityClaims::new("tok1");
        let ctx = authorize(
            Some(&claims),
            &AuthorizationRequirement::authenticated(),
            &store,
        )
        .await
        .unwrap();
        assert!(ctx.organization_id.is_none());
    }

    #[tokio::test]
    async fn test_identical_inputs_identical_outcomes() {
        let store = store_with("tok1").await;
        let org = Uuid::new_v4();
        let claims = IdentityClaims::new("tok1").with_organization(org, "viewer");
        let req = AuthorizationRequirement::member();

        for _ in 0..3 {
            let ctx = authorize(Some(&claims), &req, &store).await.unwrap();
            assert_eq!(ctx.organization_id, Some(org));
        }
    }
}
