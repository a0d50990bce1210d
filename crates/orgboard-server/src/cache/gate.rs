//! The response cache gate.
//!
//! Applied per route, around the handler and inside the authorization
//! middleware, so the organization resolved during authorization is
//! available for key derivation. On entry the gate derives the key and
//! consults the cache, short-circuiting on a hit; on completion it writes
//! back successful JSON responses under the recorded key.
//!
//! The dominant invariant is fail-open: every cache error (connection,
//! GET, SET, unreadable payload) is logged at warn and swallowed. A cache
//! outage degrades to "always miss, never cached" and never fails or
//! delays a response beyond the one bypassed round trip. The other
//! invariant is that a failed handler execution is never cached.

use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use orgboard_auth::AuthorizedContext;

use crate::metrics;
use crate::middleware::HandlerFailure;
use crate::state::AppState;

use super::key::{ParamValue, derive_key};

/// Response header reporting the gate's decision, mostly for tests and
/// debugging.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Cache configuration attached to one route.
#[derive(Debug, Clone)]
pub struct CacheSpec {
    /// Logical controller name, first key segment after the prefix.
    pub controller: &'static str,
    /// Logical action name.
    pub action: &'static str,
    /// TTL in seconds; zero or negative disables the gate for the route.
    pub ttl_seconds: i64,
}

impl CacheSpec {
    /// Creates a spec for `controller`/`action` with the given TTL.
    #[must_use]
    pub fn new(controller: &'static str, action: &'static str, ttl_seconds: i64) -> Self {
        Self {
            controller,
            action,
            ttl_seconds,
        }
    }
}

/// Per-route middleware implementing the gate.
///
/// The cache key is a local of this per-request future; nothing is stored
/// on shared state between entry and completion.
pub async fn cache_gate(
    state: AppState,
    spec: CacheSpec,
    req: Request<Body>,
    next: Next,
) -> Response {
    if spec.ttl_seconds <= 0 {
        return next.run(req).await;
    }

    let organization_id = req
        .extensions()
        .get::<AuthorizedContext>()
        .and_then(|ctx| ctx.organization_id);

    let params: Vec<(String, ParamValue)> = req
        .uri()
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.to_string(), ParamValue::from_raw(&v)))
                .collect()
        })
        .unwrap_or_default();

    let key = derive_key(
        &state.config.cache.key_prefix,
        spec.controller,
        spec.action,
        organization_id,
        &params,
    );

    match state.cache.get(&key).await {
        Ok(Some(payload)) => {
            tracing::debug!(key = %key, "response cache hit");
            metrics::record_cache_hit("response");
            return cached_response(payload);
        }
        Ok(None) => {
            tracing::debug!(key = %key, "response cache miss");
            metrics::record_cache_miss();
        }
        Err(e) => {
            // Fail open: an unreachable cache is a miss, not a failure.
            tracing::warn!(key = %key, error = %e, "cache get failed, bypassing cache");
            metrics::record_cache_error("get");
        }
    }

    let response = next.run(req).await;

    // Never cache a failed handler execution.
    if !response.status().is_success() {
        return response;
    }
    if !is_json(&response) {
        return response;
    }

    // Declared-length fast path: skip buffering when the body announces
    // it is over the cap.
    let too_large = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len > state.config.cache.max_body_bytes);
    if too_large {
        tracing::debug!(key = %key, "response too large to cache");
        return response;
    }

    // The client must receive these bytes whether or not they get cached,
    // so buffering is uncapped; the size cap only gates the write below.
    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            // The body failed mid-stream; there is nothing left to hand back.
            tracing::error!(key = %key, error = %e, "response body failed while buffering");
            let mut failed = StatusCode::INTERNAL_SERVER_ERROR.into_response();
            failed
                .extensions_mut()
                .insert(HandlerFailure(format!("response body failed: {e}")));
            return failed;
        }
    };

    if bytes.len() > state.config.cache.max_body_bytes {
        tracing::debug!(key = %key, size = bytes.len(), "response too large to cache");
        return Response::from_parts(parts, Body::from(bytes));
    }

    match std::str::from_utf8(&bytes) {
        Ok(payload) => {
            let ttl = Duration::from_secs(spec.ttl_seconds as u64);
            if let Err(e) = state.cache.set(&key, payload, ttl).await {
                tracing::warn!(key = %key, error = %e, "cache set failed, response not cached");
                metrics::record_cache_error("set");
            } else {
                tracing::debug!(key = %key, ttl_seconds = spec.ttl_seconds, "response cached");
            }
        }
        Err(e) => {
            // Serialization failure: skip the write, never the response.
            tracing::warn!(key = %key, error = %e, "response body not cacheable");
            metrics::record_cache_error("encode");
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("application/json") || ct.contains("+json")
        })
}

fn cached_response(payload: String) -> Response {
    let mut response = Response::new(Body::from(payload));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
        .headers_mut()
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("hit"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_json() {
        let mut res = Response::new(Body::empty());
        assert!(!is_json(&res));

        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(is_json(&res));

        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        assert!(is_json(&res));

        res.headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        assert!(!is_json(&res));
    }

    #[test]
    fn test_cached_response_shape() {
        let res = cached_response("{\"a\":1}".to_string());
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(res.headers().get(CACHE_STATUS_HEADER).unwrap(), "hit");
    }
}
