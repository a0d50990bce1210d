//! Router assembly and the server run loop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware,
    middleware::Next,
    routing::{MethodRouter, get, post},
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer};

use orgboard_auth::{AuthorizationRequirement, MemorySessionStore, SessionStore};

use crate::cache::{CacheSpec, cache_gate, create_response_cache};
use crate::config::AppConfig;
use crate::handlers;
use crate::middleware as app_middleware;
use crate::state::AppState;

/// Wires configuration into the shared state: an in-memory session store
/// and the configured response cache backend.
pub fn build_state(cfg: AppConfig) -> anyhow::Result<AppState> {
    let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let cache = create_response_cache(&cfg.redis)?;
    Ok(AppState::new(cfg, sessions, cache))
}

/// Wraps one route in its authorization requirement and, optionally, the
/// response cache gate.
///
/// Layer order matters: authorization must run before the gate so the
/// resolved organization is available for key derivation, and so denied
/// requests never touch the cache.
fn guarded(
    state: &AppState,
    path: &str,
    handler: MethodRouter<AppState>,
    requirement: AuthorizationRequirement,
    cache: Option<CacheSpec>,
) -> Router<AppState> {
    let mut router = Router::new().route(path, handler);

    if let Some(spec) = cache {
        let state = state.clone();
        router = router.route_layer(middleware::from_fn(
            move |req: Request<Body>, next: Next| cache_gate(state.clone(), spec.clone(), req, next),
        ));
    }

    let state = state.clone();
    router.route_layer(middleware::from_fn(
        move |req: Request<Body>, next: Next| {
            app_middleware::enforce(state.clone(), requirement.clone(), req, next)
        },
    ))
}

pub fn build_app(state: AppState) -> Router {
    let report_ttl = state.config.cache.report_ttl_seconds;
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        // Operational endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics_endpoint))
        // Auth endpoints
        .route("/auth/login", get(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        // Protected surface
        .merge(guarded(
            &state,
            "/reports/summary",
            get(handlers::reports_summary),
            AuthorizationRequirement::member(),
            Some(CacheSpec::new("Reports", "Summary", report_ttl)),
        ))
        .merge(guarded(
            &state,
            "/reports/activity",
            get(handlers::reports_activity),
            AuthorizationRequirement::admin(),
            Some(CacheSpec::new("Reports", "Activity", report_ttl)),
        ))
        .merge(guarded(
            &state,
            "/org/settings",
            get(handlers::org_settings),
            AuthorizationRequirement::owner(),
            None,
        ))
        .merge(guarded(
            &state,
            "/me",
            get(handlers::me),
            AuthorizationRequirement::organization_selected(),
            None,
        ))
        // Middleware stack (order: request id -> claims -> telemetry -> route layers)
        .layer(middleware::from_fn(app_middleware::request_telemetry))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::attach_claims,
        ))
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub struct OrgboardServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    state: Option<AppState>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self { state: None }
    }

    pub fn with_state(mut self, state: AppState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn build(self) -> anyhow::Result<OrgboardServer> {
        let state = match self.state {
            Some(s) => s,
            None => build_state(AppConfig::default())?,
        };
        let addr = state.config.addr();
        Ok(OrgboardServer {
            addr,
            app: build_app(state),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrgboardServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
