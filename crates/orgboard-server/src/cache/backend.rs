//! Response cache backends.
//!
//! The trait abstracts the cache implementation so the gate can run
//! against Redis in multi-instance deployments, a local DashMap in
//! single-instance mode, or a no-op when caching is disabled. Backends
//! surface their errors; swallowing them is the gate's job, so tests can
//! also inject an always-failing backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::{Config as RedisPoolConfig, Pool, Runtime};
use redis::AsyncCommands;

use crate::config::RedisConfig;

/// Errors from a cache backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached or rejected the operation.
    #[error("cache backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

impl CacheError {
    /// Creates a new backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// External key-value cache for serialized JSON response payloads.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Gets the payload stored under `key`, or `None` on a miss.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails; callers decide whether that
    /// degrades to a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// A cached entry with TTL support.
#[derive(Clone)]
struct CachedEntry {
    value: Arc<str>,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Single-instance cache backed by a concurrent map.
///
/// Expired entries are dropped lazily on read.
#[derive(Default)]
pub struct LocalResponseCache {
    entries: DashMap<String, CachedEntry>,
}

impl LocalResponseCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held (including not-yet-reaped ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResponseCache for LocalResponseCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.value.to_string()));
            }
            drop(entry);
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                value: Arc::from(value),
                cached_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }
}

/// Redis-backed cache shared across server instances.
pub struct RedisResponseCache {
    pool: Pool,
}

impl RedisResponseCache {
    /// Builds a cache over a connection pool for `cfg.url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created from the URL.
    pub fn new(cfg: &RedisConfig) -> Result<Self, CacheError> {
        let mut pool_cfg = RedisPoolConfig::from_url(&cfg.url);
        pool_cfg.pool = Some(deadpool_redis::PoolConfig::new(cfg.pool_size));
        let pool = pool_cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::backend(format!("failed to create redis pool: {e}")))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl ResponseCache for RedisResponseCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::backend(format!("redis connection failed: {e}")))?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| CacheError::backend(format!("redis GET failed: {e}")))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::backend(format!("redis connection failed: {e}")))?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .map_err(|e| CacheError::backend(format!("redis SETEX failed: {e}")))
    }
}

/// Cache that stores nothing and never hits.
pub struct NoOpResponseCache;

#[async_trait]
impl ResponseCache for NoOpResponseCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Creates the response cache selected by configuration.
///
/// Redis mode requires a valid pool config; local mode always succeeds.
///
/// # Errors
///
/// Returns an error if the Redis pool cannot be created.
pub fn create_response_cache(cfg: &RedisConfig) -> Result<Arc<dyn ResponseCache>, CacheError> {
    if cfg.enabled {
        tracing::info!(url = %cfg.url, "response cache: redis");
        Ok(Arc::new(RedisResponseCache::new(cfg)?))
    } else {
        tracing::info!("response cache: local in-memory");
        Ok(Arc::new(LocalResponseCache::new()))
    }
}
