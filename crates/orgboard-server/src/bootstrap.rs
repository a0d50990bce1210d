//! Development bootstrap: seeds a demo organization with one session per
//! role preset and logs ready-made identity cookies, so the protected
//! surface can be exercised without an external identity provider.

use std::time::Duration;

use uuid::Uuid;

use orgboard_auth::{IdentityClaims, SessionRecord, roles};

use crate::state::AppState;

/// Seeds demo sessions when `[bootstrap] enabled = true`.
///
/// # Errors
///
/// Returns an error if the session store or claims encoding fails.
pub async fn run(state: &AppState) -> anyhow::Result<()> {
    if !state.config.bootstrap.enabled {
        return Ok(());
    }

    let organization_id = Uuid::new_v4();
    let ttl = Duration::from_secs(state.config.auth.session_ttl_seconds);
    tracing::info!(%organization_id, "bootstrapping demo organization");

    for role in [roles::OWNER, roles::ADMIN, roles::MEMBER, roles::VIEWER] {
        let token = format!("demo-{role}");
        let user_id = Uuid::new_v4();
        state
            .sessions
            .create(&token, SessionRecord::new(user_id, ttl))
            .await?;

        let claims = IdentityClaims::new(&token)
            .with_organization(organization_id, role)
            .with_display_name(format!("Demo {role}"));
        let cookie = format!("{}={}", state.config.auth.cookie_name, claims.encode()?);
        tracing::info!(role, cookie, "demo session ready");
    }

    Ok(())
}
