//! HTTP middleware: claims extraction, authorization enforcement,
//! request ids and request telemetry.

use std::time::Instant;

use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::{
    Json,
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode, header::COOKIE},
    middleware::Next,
    response::{Redirect, Response},
};
use serde_json::json;
use uuid::Uuid;

use orgboard_auth::{AuthError, AuthorizationRequirement, IdentityClaims, authorize};

use crate::metrics;
use crate::state::AppState;

// =============================================================================
// Claims Middleware
// =============================================================================

/// Decodes the identity cookie into [`IdentityClaims`] and attaches them
/// to request extensions.
///
/// Runs on every route. Absence of the cookie, or an undecodable payload,
/// simply leaves the request unauthenticated; the authorization middleware
/// decides whether that matters for the route.
pub async fn attach_claims(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(payload) = cookie_value(&req, &state.config.auth.cookie_name) {
        match IdentityClaims::decode(&payload) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
            }
            Err(e) => {
                tracing::debug!(error = %e, "ignoring undecodable identity cookie");
            }
        }
    }
    next.run(req).await
}

/// Extracts a cookie value from the Cookie header by name.
fn cookie_value(req: &Request<Body>, cookie_name: &str) -> Option<String> {
    let cookie_header = req.headers().get(COOKIE)?.to_str().ok()?;
    for cookie in cookie_header.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=') {
            if name.trim() == cookie_name {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

// =============================================================================
// Authorization Middleware
// =============================================================================

/// Per-route middleware enforcing an [`AuthorizationRequirement`].
///
/// On allow, the resolved [`orgboard_auth::AuthorizedContext`] is attached
/// to request extensions for the cache gate and handlers. On deny the
/// presentation depends on the reason:
///
/// - unauthenticated (no identity, or dead session) redirects to the login
///   entry point with the original path in `return_to`;
/// - authenticated but denied (role or organization mismatch) renders an
///   access-denied response, never a redirect.
pub async fn enforce(
    state: AppState,
    requirement: AuthorizationRequirement,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let claims = req.extensions().get::<IdentityClaims>().cloned();

    match authorize(claims.as_ref(), &requirement, state.sessions.as_ref()).await {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(e) => {
            metrics::record_authz_denied(&e.category().to_string());
            tracing::info!(
                reason = %e,
                path = %req.uri().path(),
                principal = claims
                    .as_ref()
                    .and_then(|c| c.display_name.as_deref())
                    .unwrap_or("anonymous"),
                "authorization denied"
            );
            deny_response(&state, &e, &req)
        }
    }
}

/// Builds the client-facing response for a denied request.
fn deny_response(state: &AppState, error: &AuthError, req: &Request<Body>) -> Response {
    if error.is_authentication_error() {
        let original = req
            .uri()
            .path_and_query()
            .map_or_else(|| req.uri().path().to_string(), ToString::to_string);
        let target = format!(
            "{}?return_to={}",
            state.config.auth.login_path,
            urlencoding::encode(&original)
        );
        return Redirect::to(&target).into_response();
    }

    if error.is_authorization_error() {
        return access_denied_response(&error.to_string());
    }

    // Server-side failure in the auth layer itself. The failure detail
    // travels as a response extension so telemetry can log it.
    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "internal",
            "message": "authorization could not be evaluated",
        })),
    )
        .into_response();
    response
        .extensions_mut()
        .insert(HandlerFailure(error.to_string()));
    response
}

/// Renders the access-denied body for authenticated-but-forbidden requests.
fn access_denied_response(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": "access_denied",
            "message": message,
        })),
    )
        .into_response()
}

// =============================================================================
// Request Id Middleware
// =============================================================================

// Middleware that ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // If the incoming request already has a request-id, preserve it; otherwise generate one
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap());

    // Add to request extensions for downstream usage (e.g., logging)
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;

    // Add/propagate the request id header to response
    res.headers_mut().insert(header_name, req_id_value);

    res
}

// =============================================================================
// Request Telemetry Middleware
// =============================================================================

/// Failure detail a handler (or error type) can attach to its response so
/// telemetry logs the underlying error alongside the 5xx status.
#[derive(Debug, Clone)]
pub struct HandlerFailure(pub String);

/// Times the request and emits one structured log line on completion.
///
/// Severity scales with duration: sub-second requests log at trace, one to
/// three seconds at info, slower at warn. A failed handler (5xx) always
/// logs at error with the failure detail attached when present. The timer
/// is a local of this per-request future.
pub async fn request_telemetry(req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();

    let method = req.method().clone();
    // No route here carries path parameters, so the raw path is the route.
    let route = req.uri().path().to_string();
    let client = client_address(&req);
    let principal = req
        .extensions()
        .get::<IdentityClaims>()
        .and_then(|c| c.display_name.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    let res = next.run(req).await;

    let elapsed = started.elapsed();
    let status = res.status().as_u16();
    metrics::record_http_request(method.as_str(), &route, status, elapsed);

    if res.status().is_server_error() {
        let failure = res
            .extensions()
            .get::<HandlerFailure>()
            .map_or("unspecified handler failure", |f| f.0.as_str());
        tracing::error!(
            method = %method,
            route = %route,
            status,
            client = %client,
            principal = %principal,
            elapsed_ms = elapsed.as_millis() as u64,
            error = failure,
            "request failed"
        );
        return res;
    }

    let elapsed_ms = elapsed.as_millis() as u64;
    if elapsed_ms < 1_000 {
        tracing::trace!(
            method = %method,
            route = %route,
            status,
            client = %client,
            principal = %principal,
            elapsed_ms,
            "request handled"
        );
    } else if elapsed_ms <= 3_000 {
        tracing::info!(
            method = %method,
            route = %route,
            status,
            client = %client,
            principal = %principal,
            elapsed_ms,
            "request handled"
        );
    } else {
        tracing::warn!(
            method = %method,
            route = %route,
            status,
            client = %client,
            principal = %principal,
            elapsed_ms,
            "slow request"
        );
    }

    res
}

/// Normalizes the client address, preferring proxy headers over the raw
/// peer address. A comma-separated X-Forwarded-For yields its first entry.
fn client_address(req: &Request<Body>) -> String {
    if let Some(forwarded) = header_str(req, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = header_str(req, "x-real-ip") {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ci| ci.0.ip().to_string())
}

fn header_str<'a>(req: &'a Request<Body>, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}
