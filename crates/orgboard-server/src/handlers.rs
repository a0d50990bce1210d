//! HTTP handlers: operational endpoints, the login entry point and the
//! demo protected surface exercising each authorization preset.

use axum::extract::{Extension, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use orgboard_auth::{AuthorizedContext, IdentityClaims};

use crate::metrics;
use crate::state::AppState;

// =============================================================================
// Operational endpoints
// =============================================================================

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "Orgboard Server",
        "status": "ok",
    }))
}

pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn readyz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ready" }))
}

pub async fn metrics_endpoint() -> Response {
    match metrics::render_metrics() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}

// =============================================================================
// Auth endpoints
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub return_to: Option<String>,
}

/// The login entry point unauthenticated requests are redirected to.
///
/// Credential verification and cookie issuance belong to the upstream
/// identity layer; this renders a placeholder that preserves the return
/// target.
pub async fn login(Query(query): Query<LoginQuery>) -> Html<String> {
    let return_to = query.return_to.as_deref().unwrap_or("/");
    Html(format!(
        "<!doctype html><html><body><h1>Sign in to Orgboard</h1>\
         <p>You will be returned to <code>{}</code>.</p></body></html>",
        html_escape(return_to)
    ))
}

/// Deletes the current session and clears the identity cookie.
pub async fn logout(
    State(state): State<AppState>,
    claims: Option<Extension<IdentityClaims>>,
) -> Response {
    if let Some(Extension(claims)) = claims {
        if let Err(e) = state.sessions.delete(&claims.session_token).await {
            tracing::warn!(error = %e, "failed to delete session on logout");
        }
    }
    let clear = format!(
        "{}=; Max-Age=0; Path=/; HttpOnly",
        state.config.auth.cookie_name
    );
    (
        [(header::SET_COOKIE, clear)],
        Json(json!({ "status": "logged_out" })),
    )
        .into_response()
}

// Minimal HTML escaping for the one interpolated value above.
fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// =============================================================================
// Protected surface
// =============================================================================

/// Identity summary for the signed-in user. Requires a selected
/// organization but no particular role.
pub async fn me(
    Extension(ctx): Extension<AuthorizedContext>,
    claims: Option<Extension<IdentityClaims>>,
) -> Json<serde_json::Value> {
    let claims = claims.map(|Extension(c)| c);
    Json(json!({
        "user_id": ctx.user_id,
        "organization_id": ctx.organization_id,
        "organization_role": claims.as_ref().and_then(|c| c.organization_role.clone()),
        "display_name": ctx.display_name,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// A cacheable aggregate report. Optional fields are omitted from the
/// serialized body, so cached payloads never carry nulls.
#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub organization_id: Uuid,
    pub active_members: u64,
    pub open_items: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Wall-clock marker distinguishing fresh computations from cached ones.
    pub generated_at_nanos: i128,
}

/// Member-level report endpoint, wrapped by the response cache gate.
pub async fn reports_summary(
    Extension(ctx): Extension<AuthorizedContext>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ReportSummary>, StatusCode> {
    let organization_id = ctx.organization_id.ok_or(StatusCode::FORBIDDEN)?;

    // Stand-in for the expensive aggregation this endpoint exists to cache.
    let seed = organization_id.as_u128();
    Ok(Json(ReportSummary {
        organization_id,
        active_members: (seed % 97) as u64,
        open_items: (seed % 403) as u64,
        from: query.from,
        to: query.to,
        generated_at_nanos: OffsetDateTime::now_utc().unix_timestamp_nanos(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub days: Option<u32>,
}

/// Admin-level activity report, also behind the cache gate.
pub async fn reports_activity(
    Extension(ctx): Extension<AuthorizedContext>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let organization_id = ctx.organization_id.ok_or(StatusCode::FORBIDDEN)?;
    let days = query.days.unwrap_or(30);
    let seed = organization_id.as_u128();

    Ok(Json(json!({
        "organization_id": organization_id,
        "window_days": days,
        "events": (seed % 1009) as u64 * u64::from(days),
        "generated_at_nanos": OffsetDateTime::now_utc().unix_timestamp_nanos(),
    })))
}

/// Owner-only organization settings. Not cached: settings reads must
/// always reflect the latest state.
pub async fn org_settings(
    Extension(ctx): Extension<AuthorizedContext>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let organization_id = ctx.organization_id.ok_or(StatusCode::FORBIDDEN)?;
    Ok(Json(json!({
        "organization_id": organization_id,
        "billing_plan": "team",
        "seats": 25,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_summary_omits_nulls() {
        let summary = ReportSummary {
            organization_id: Uuid::new_v4(),
            active_members: 5,
            open_items: 2,
            from: None,
            to: Some("2024-05-01".to_string()),
            generated_at_nanos: 42,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("from").is_none());
        assert_eq!(json["to"], "2024-05-01");
    }

    #[test]
    fn test_login_escapes_return_target() {
        let escaped = html_escape("/x?<script>");
        assert!(!escaped.contains('<'));
        assert!(escaped.contains("&lt;script&gt;"));
    }
}
