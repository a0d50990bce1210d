//! Session store interface and in-memory implementation.
//!
//! The authorization chain uses the store only as a liveness check: a
//! session either exists for a token or it does not. Implementations
//! should treat tokens as sensitive and never log them whole.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AuthResult;

/// A stored session record.
///
/// Beyond existence, the chain does not inspect this payload; the fields
/// exist for session management (bootstrap, logout, cleanup).
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Unique session id.
    pub id: Uuid,
    /// The user this session belongs to.
    pub user_id: Uuid,
    /// When the session was created.
    pub created_at: OffsetDateTime,
    /// When the session stops being valid.
    pub expires_at: OffsetDateTime,
}

impl SessionRecord {
    /// Creates a record for `user_id` valid for `ttl` from now.
    #[must_use]
    pub fn new(user_id: Uuid, ttl: Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            user_id,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Returns `true` if the session is still live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.expires_at > OffsetDateTime::now_utc()
    }
}

/// Storage trait for login sessions.
///
/// `lookup` is the only call on the authorization hot path. It may block
/// or suspend on network I/O; no retry is attempted by callers, and a
/// lookup error is treated by the chain exactly like "not found".
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Finds a live session by its token.
    ///
    /// Returns `None` for unknown and for expired tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    async fn lookup(&self, token: &str) -> AuthResult<Option<SessionRecord>>;

    /// Stores a session under `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    async fn create(&self, token: &str, record: SessionRecord) -> AuthResult<()>;

    /// Deletes the session for `token`, if any. Used by logout.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    async fn delete(&self, token: &str) -> AuthResult<()>;
}

/// In-memory session store backed by a concurrent map.
///
/// Suitable for single-instance deployments, development and tests.
/// Expired entries are dropped lazily on lookup.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held (live or not yet reaped).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn lookup(&self, token: &str) -> AuthResult<Option<SessionRecord>> {
        if let Some(entry) = self.sessions.get(token) {
            if entry.is_live() {
                return Ok(Some(entry.clone()));
            }
            drop(entry);
            self.sessions.remove(token);
        }
        Ok(None)
    }

    async fn create(&self, token: &str, record: SessionRecord) -> AuthResult<()> {
        self.sessions.insert(token.to_string(), record);
        Ok(())
    }

    async fn delete(&self, token: &str) -> AuthResult<()> {
        self.sessions.remove(token);
        Ok(())
    }
}
