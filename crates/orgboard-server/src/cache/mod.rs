//! Response caching for expensive JSON endpoints.
//!
//! ## Architecture
//!
//! - **Key deriver**: deterministic string keys from controller/action,
//!   the authorization-resolved organization and sorted request parameters.
//! - **Backend**: a `ResponseCache` trait with local (DashMap), Redis and
//!   no-op implementations.
//! - **Gate**: per-route middleware that short-circuits on a hit and
//!   writes back successful JSON responses on a miss.
//!
//! ## Graceful degradation
//!
//! Every backend error is swallowed by the gate: an unreachable Redis
//! degrades to "always miss" and never fails a request.

pub mod backend;
pub mod gate;
pub mod key;

pub use backend::{
    CacheError, LocalResponseCache, NoOpResponseCache, RedisResponseCache, ResponseCache,
    create_response_cache,
};
pub use gate::{CacheSpec, cache_gate};
pub use key::{DEFAULT_KEY_PREFIX, ParamValue, derive_key};
