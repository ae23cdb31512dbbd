//! Pluggable storage backends for login challenges.
//!
//! Each backend keeps at most one challenge per identity key and treats an
//! expired challenge exactly like an absent one. The available backends
//! depend on the enabled features.

use crate::AuthError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

// Always available
mod memory;
pub use memory::MemoryStorage;

// Feature-gated storage backends
#[cfg(feature = "sqlite-storage")]
mod sqlite;
#[cfg(feature = "sqlite-storage")]
pub use sqlite::SqliteStorage;

#[cfg(feature = "redis-storage")]
mod redis;
#[cfg(feature = "redis-storage")]
pub use redis::RedisStorage;

/// A stored login challenge with its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeEntry {
    /// Normalized identity key the challenge belongs to
    pub identity_key: String,
    /// The text the client must sign
    pub challenge: String,
    /// Unix timestamp when the challenge was (re)issued
    pub created_at: i64,
    /// Unix timestamp from which the challenge is treated as absent
    pub expires_at: i64,
}

impl ChallengeEntry {
    /// Returns true if the entry is no longer usable at `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        crate::auth::time_utils::is_expired_at(self.expires_at, now)
    }
}

/// Statistics about the challenge storage backend.
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Total number of challenge records in storage, expired ones included
    pub total_records: usize,
    /// Additional backend-specific information
    pub backend_info: String,
}

/// Abstract storage backend for login challenges.
///
/// # Available Implementations
///
/// - [`MemoryStorage`] - Always available, in-memory HashMap-based storage
/// - `SqliteStorage` - Available with `sqlite-storage` feature, persistent SQLite storage
/// - `RedisStorage` - Available with `redis-storage` feature, distributed Redis storage
///
/// # Contract
///
/// - `upsert` replaces any previous challenge for the identity and resets its timestamps.
/// - `get` never returns an expired entry.
/// - `remove_if` is an atomic compare-and-delete: it only removes the entry
///   when the stored text still equals the expected text, so two concurrent
///   logins on one challenge cannot both succeed.
///
/// All methods must be safe to call concurrently for different identities.
#[async_trait]
pub trait ChallengeStorage: Send + Sync {
    /// Optional method for storage backend initialization.
    ///
    /// Called once by the builder before the flow is handed out.
    async fn init(&self) -> Result<(), AuthError> {
        Ok(())
    }

    /// Stores `challenge` for `identity_key`, overwriting any live or expired entry.
    async fn upsert(
        &self,
        identity_key: &str,
        challenge: &str,
        ttl: Duration,
    ) -> Result<ChallengeEntry, AuthError>;

    /// Returns the live challenge for `identity_key`, or `None` if absent or expired.
    async fn get(&self, identity_key: &str) -> Result<Option<ChallengeEntry>, AuthError>;

    /// Removes the entry only if its text equals `challenge`.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The entry matched and was removed
    /// * `Ok(false)` - No entry, or it was replaced by a newer challenge
    async fn remove_if(&self, identity_key: &str, challenge: &str) -> Result<bool, AuthError>;

    /// Removes whatever challenge is stored for `identity_key`.
    async fn remove(&self, identity_key: &str) -> Result<bool, AuthError>;

    /// Removes all entries whose expiry is at or before `now`.
    ///
    /// # Returns
    ///
    /// * `Ok(count)` - Number of entries that were removed
    async fn cleanup_expired(&self, now: i64) -> Result<usize, AuthError>;

    /// Returns statistics about the storage backend.
    async fn get_stats(&self) -> Result<StorageStats, AuthError>;
}
