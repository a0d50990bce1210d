//! Response cache gate behavior over the real router, plus failure-mode
//! tests with injected cache backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode, header};
use axum::middleware::{self, Next};
use axum::routing::get;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use orgboard_auth::{IdentityClaims, MemorySessionStore, SessionRecord, SessionStore};
use orgboard_server::cache::{
    CacheError, CacheSpec, LocalResponseCache, ResponseCache, cache_gate,
};
use orgboard_server::{AppConfig, AppState, build_app};

/// Backend that fails every operation, standing in for an unreachable Redis.
struct FailingCache;

#[async_trait]
impl ResponseCache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::backend("connection refused"))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::backend("connection refused"))
    }
}

/// Delegating backend that counts writes.
#[derive(Default)]
struct RecordingCache {
    inner: LocalResponseCache,
    sets: AtomicUsize,
}

#[async_trait]
impl ResponseCache for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }
}

fn app_with_cache(cfg: AppConfig, cache: Arc<dyn ResponseCache>) -> (Router, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::new());
    let sessions: Arc<dyn SessionStore> = store.clone();
    (build_app(AppState::new(cfg, sessions, cache)), store)
}

async fn member_cookie(store: &MemorySessionStore, org: Uuid) -> String {
    let token = Uuid::new_v4().to_string();
    store
        .create(
            &token,
            SessionRecord::new(Uuid::new_v4(), Duration::from_secs(600)),
        )
        .await
        .unwrap();
    let claims = IdentityClaims::new(&token).with_organization(org, "member");
    format!("orgboard_identity={}", claims.encode().unwrap())
}

async fn get_with_cookie(app: &Router, path: &str, cookie: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(path)
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

#[tokio::test]
async fn second_request_is_served_from_cache() {
    let (app, store) = app_with_cache(AppConfig::default(), Arc::new(LocalResponseCache::new()));
    let cookie = member_cookie(&store, Uuid::new_v4()).await;

    let first = get_with_cookie(&app, "/reports/summary", &cookie).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert!(first.headers().get("x-cache").is_none());
    let first_body = body_bytes(first).await;

    let second = get_with_cookie(&app, "/reports/summary", &cookie).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers().get("x-cache").unwrap(), "hit");
    assert_eq!(body_bytes(second).await, first_body);
}

#[tokio::test]
async fn organizations_never_share_cache_entries() {
    let (app, store) = app_with_cache(AppConfig::default(), Arc::new(LocalResponseCache::new()));
    let org_a = Uuid::new_v4();
    let org_b = Uuid::new_v4();
    let cookie_a = member_cookie(&store, org_a).await;
    let cookie_b = member_cookie(&store, org_b).await;

    // Warm the cache for tenant A.
    let warm = get_with_cookie(&app, "/reports/summary", &cookie_a).await;
    assert_eq!(warm.status(), StatusCode::OK);

    // Tenant B's first request must be a miss with B's own data.
    let response = get_with_cookie(&app, "/reports/summary", &cookie_b).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-cache").is_none());
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["organization_id"], org_b.to_string());
}

#[tokio::test]
async fn query_parameters_partition_the_cache() {
    let (app, store) = app_with_cache(AppConfig::default(), Arc::new(LocalResponseCache::new()));
    let cookie = member_cookie(&store, Uuid::new_v4()).await;

    let warm = get_with_cookie(&app, "/reports/summary?from=2024-05-01", &cookie).await;
    assert_eq!(warm.status(), StatusCode::OK);

    // No params is a different key.
    let response = get_with_cookie(&app, "/reports/summary", &cookie).await;
    assert!(response.headers().get("x-cache").is_none());
}

#[tokio::test]
async fn timestamps_normalize_to_the_same_key_as_dates() {
    let (app, store) = app_with_cache(AppConfig::default(), Arc::new(LocalResponseCache::new()));
    let cookie = member_cookie(&store, Uuid::new_v4()).await;

    let warm = get_with_cookie(&app, "/reports/summary?from=2024-05-01", &cookie).await;
    assert_eq!(warm.status(), StatusCode::OK);

    // Sub-day precision is dropped during key derivation.
    let response =
        get_with_cookie(&app, "/reports/summary?from=2024-05-01T09:30:00Z", &cookie).await;
    assert_eq!(response.headers().get("x-cache").unwrap(), "hit");
}

#[tokio::test]
async fn unreachable_cache_degrades_to_uncached_serving() {
    let (app, store) = app_with_cache(AppConfig::default(), Arc::new(FailingCache));
    let cookie = member_cookie(&store, Uuid::new_v4()).await;

    for _ in 0..2 {
        let response = get_with_cookie(&app, "/reports/summary", &cookie).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-cache").is_none());
    }
}

#[tokio::test]
async fn zero_ttl_disables_the_gate() {
    let mut cfg = AppConfig::default();
    cfg.cache.report_ttl_seconds = 0;
    let recording = Arc::new(RecordingCache::default());
    let (app, store) = app_with_cache(cfg, recording.clone());
    let cookie = member_cookie(&store, Uuid::new_v4()).await;

    for _ in 0..2 {
        let response = get_with_cookie(&app, "/reports/summary", &cookie).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-cache").is_none());
    }

    assert_eq!(recording.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_handlers_are_never_cached() {
    let recording = Arc::new(RecordingCache::default());
    let state = AppState::new(
        AppConfig::default(),
        Arc::new(MemorySessionStore::new()),
        recording.clone(),
    );

    // A gate-wrapped route whose handler always fails.
    let spec = CacheSpec::new("Reports", "Broken", 300);
    let gate_state = state.clone();
    let app: Router = Router::new()
        .route(
            "/broken",
            get(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(serde_json::json!({ "error": "boom" })),
                )
            }),
        )
        .route_layer(middleware::from_fn(move |req: Request<Body>, next: Next| {
            cache_gate(gate_state.clone(), spec.clone(), req, next)
        }))
        .with_state(state);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/broken").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get("x-cache").is_none());
    }

    assert_eq!(recording.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oversized_streamed_responses_are_served_but_not_cached() {
    let recording = Arc::new(RecordingCache::default());
    let state = AppState::new(
        AppConfig::default(),
        Arc::new(MemorySessionStore::new()),
        recording.clone(),
    );

    // 512 KiB of JSON delivered as a stream, so no Content-Length is set
    // and the gate only learns the size by buffering.
    const CHUNK: usize = 8 * 1024;
    const CHUNKS: usize = 64;
    let spec = CacheSpec::new("Reports", "Bulk", 300);
    let gate_state = state.clone();
    let app: Router = Router::new()
        .route(
            "/bulk",
            get(|| async {
                let chunks = std::iter::once(Bytes::from_static(b"\""))
                    .chain((0..CHUNKS).map(|_| Bytes::from(vec![b'a'; CHUNK])))
                    .chain(std::iter::once(Bytes::from_static(b"\"")));
                let stream = futures::stream::iter(chunks.map(Ok::<_, std::io::Error>));
                (
                    [(header::CONTENT_TYPE, "application/json")],
                    Body::from_stream(stream),
                )
            }),
        )
        .route_layer(middleware::from_fn(move |req: Request<Body>, next: Next| {
            cache_gate(gate_state.clone(), spec.clone(), req, next)
        }))
        .with_state(state);

    // The response must come through intact even though it exceeds the
    // caching size cap.
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/bulk").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.len(), 2 + CHUNKS * CHUNK);

    // Too large to cache: the second request misses again and no write
    // ever happened.
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/bulk").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-cache").is_none());
    assert_eq!(recording.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn denied_requests_never_touch_the_cache() {
    let recording = Arc::new(RecordingCache::default());
    let store = Arc::new(MemorySessionStore::new());
    let sessions: Arc<dyn SessionStore> = store.clone();
    let app = build_app(AppState::new(AppConfig::default(), sessions, recording.clone()));

    // Unauthenticated request to a cached route.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/reports/summary")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(recording.sets.load(Ordering::SeqCst), 0);
}
