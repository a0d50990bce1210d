//! Orgboard server: multi-tenant HTTP surface with per-route
//! authorization and a shared response cache.

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod state;

pub use config::{AppConfig, load_config};
pub use server::{OrgboardServer, ServerBuilder, build_app, build_state};
pub use state::AppState;
