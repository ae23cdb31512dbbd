//! In-memory storage backend implementation.
//!
//! This module provides a simple in-memory storage backend that uses a HashMap
//! keyed by identity. It's ideal for testing, development, and single-instance
//! deployments where challenges need not survive a restart.

use super::{ChallengeEntry, ChallengeStorage, StorageStats};
use crate::AuthError;
use crate::auth::time_utils;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// A simple in-memory challenge store.
///
/// The map is wrapped in `Arc<RwLock<>>` for thread-safe access. Expired
/// entries are hidden on every read and physically removed by
/// [`cleanup_expired`](ChallengeStorage::cleanup_expired).
///
/// # Example
///
/// ```rust
/// use registry_auth::storage::{ChallengeStorage, MemoryStorage};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), registry_auth::AuthError> {
/// let storage = MemoryStorage::new();
///
/// storage.upsert("0xabc", "Login nonce: 1", Duration::from_secs(300)).await?;
/// let entry = storage.get("0xabc").await?;
/// assert_eq!(entry.unwrap().challenge, "Login nonce: 1");
///
/// assert!(storage.remove_if("0xabc", "Login nonce: 1").await?);
/// assert!(storage.get("0xabc").await?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<String, ChallengeEntry>>>,
}

impl MemoryStorage {
    /// Creates a new in-memory storage instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage instance with room for `capacity` identities.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::with_capacity(capacity))),
        }
    }
}

#[async_trait]
impl ChallengeStorage for MemoryStorage {
    async fn upsert(
        &self,
        identity_key: &str,
        challenge: &str,
        ttl: Duration,
    ) -> Result<ChallengeEntry, AuthError> {
        let created_at = time_utils::current_timestamp()?;
        let entry = ChallengeEntry {
            identity_key: identity_key.to_string(),
            challenge: challenge.to_string(),
            created_at,
            expires_at: time_utils::expires_at(created_at, ttl),
        };

        let mut data = self.data.write().await;
        data.insert(identity_key.to_string(), entry.clone());
        Ok(entry)
    }

    async fn get(&self, identity_key: &str) -> Result<Option<ChallengeEntry>, AuthError> {
        let now = time_utils::current_timestamp()?;
        let data = self.data.read().await;
        Ok(data
            .get(identity_key)
            .filter(|entry| !entry.is_expired_at(now))
            .cloned())
    }

    async fn remove_if(&self, identity_key: &str, challenge: &str) -> Result<bool, AuthError> {
        let mut data = self.data.write().await;
        match data.get(identity_key) {
            Some(entry) if entry.challenge == challenge => {
                data.remove(identity_key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, identity_key: &str) -> Result<bool, AuthError> {
        let mut data = self.data.write().await;
        Ok(data.remove(identity_key).is_some())
    }

    async fn cleanup_expired(&self, now: i64) -> Result<usize, AuthError> {
        let mut data = self.data.write().await;
        let initial_count = data.len();
        data.retain(|_, entry| !entry.is_expired_at(now));
        Ok(initial_count - data.len())
    }

    async fn get_stats(&self) -> Result<StorageStats, AuthError> {
        let data = self.data.read().await;
        let memory_usage: usize = data
            .values()
            .map(|e| std::mem::size_of::<ChallengeEntry>() + e.identity_key.len() + e.challenge.len())
            .sum();
        Ok(StorageStats {
            total_records: data.len(),
            backend_info: format!("In-memory HashMap storage (~{} bytes)", memory_usage),
        })
    }
}
