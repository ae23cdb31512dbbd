//! Redis storage backend implementation.
//!
//! This module provides a Redis-based storage backend for login challenges.
//! It suits deployments that run several instances behind a load balancer and
//! need a challenge issued by one instance to be consumable by another.

use super::{ChallengeEntry, ChallengeStorage, StorageStats};
use crate::AuthError;
use crate::auth::time_utils;
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script, aio::MultiplexedConnection};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Deletes KEYS[1] only when its challenge field equals ARGV[1].
const REMOVE_IF_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current then
    local sep = string.find(current, '|', 1, true)
    if sep and string.sub(current, sep + 1) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
end
return 0
"#;

/// Redis-based storage backend for login challenges.
///
/// Each identity maps to one key `prefix:identity` whose value is
/// `created_at|challenge`. Expiry is delegated to Redis (`SET ... EX`), so
/// `cleanup_expired` has nothing left to sweep.
///
/// # Example
///
/// ```rust
/// use registry_auth::storage::RedisStorage;
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), registry_auth::AuthError> {
/// let storage = Arc::new(RedisStorage::new("redis://localhost:6379", "registry_auth")?);
/// # Ok(())
/// # }
/// ```
pub struct RedisStorage {
    client: Client,
    key_prefix: String,
    /// Shared persistent connection
    conn: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl RedisStorage {
    /// Create a new Redis storage backend.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `key_prefix` - Prefix for all challenge keys to avoid collisions
    pub fn new(redis_url: &str, key_prefix: &str) -> Result<Self, AuthError> {
        let client = Client::open(redis_url)
            .map_err(|e| AuthError::from_storage_message(format!("Redis client error: {}", e)))?;

        Ok(Self {
            client,
            key_prefix: key_prefix.to_string(),
            conn: Arc::new(Mutex::new(None)),
        })
    }

    /// Get or create a persistent connection
    async fn get_connection(&self) -> Result<MultiplexedConnection, AuthError> {
        let mut conn_guard = self.conn.lock().await;

        if let Some(conn) = conn_guard.as_ref() {
            let mut test_conn = conn.clone();
            match redis::cmd("PING")
                .query_async::<_, String>(&mut test_conn)
                .await
            {
                Ok(_) => return Ok(conn.clone()),
                Err(_) => {
                    *conn_guard = None;
                }
            }
        }

        let new_conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| {
                AuthError::from_storage_message(format!("Redis connection failed: {}", e))
            })?;

        *conn_guard = Some(new_conn.clone());
        Ok(new_conn)
    }

    fn make_key(&self, identity_key: &str) -> String {
        let mut key = String::with_capacity(self.key_prefix.len() + identity_key.len() + 1);
        key.push_str(&self.key_prefix);
        key.push(':');
        key.push_str(identity_key);
        key
    }

    fn encode_value(created_at: i64, challenge: &str) -> String {
        format!("{created_at}|{challenge}")
    }

    fn parse_entry(
        identity_key: &str,
        value: &str,
        ttl_remaining: i64,
        now: i64,
    ) -> Result<ChallengeEntry, AuthError> {
        let (created_at, challenge) = value
            .split_once('|')
            .ok_or_else(|| AuthError::from_storage_message("Invalid Redis value format"))?;
        let created_at: i64 = created_at
            .parse()
            .map_err(|_| AuthError::from_storage_message("Invalid timestamp in Redis value"))?;

        Ok(ChallengeEntry {
            identity_key: identity_key.to_string(),
            challenge: challenge.to_string(),
            created_at,
            expires_at: now + ttl_remaining.max(0),
        })
    }

    /// Scan keys with pattern using SCAN instead of KEYS for production safety
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, AuthError> {
        let mut conn = self.get_connection().await?;
        let mut keys = Vec::new();
        let mut cursor = 0u64;

        loop {
            let (new_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            keys.extend(batch);
            cursor = new_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl ChallengeStorage for RedisStorage {
    async fn init(&self) -> Result<(), AuthError> {
        let mut conn = self.get_connection().await?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::from_storage_message(format!("Redis ping failed: {}", e)))?;

        Ok(())
    }

    async fn upsert(
        &self,
        identity_key: &str,
        challenge: &str,
        ttl: Duration,
    ) -> Result<ChallengeEntry, AuthError> {
        let created_at = time_utils::current_timestamp()?;
        let expires_at = time_utils::expires_at(created_at, ttl);

        // A zero TTL means the challenge is born expired; nothing to store.
        if ttl.as_secs() == 0 {
            self.remove(identity_key).await?;
        } else {
            let mut conn = self.get_connection().await?;
            let key = self.make_key(identity_key);
            let value = Self::encode_value(created_at, challenge);
            let _: () = redis::cmd("SET")
                .arg(&key)
                .arg(value)
                .arg("EX")
                .arg(ttl.as_secs())
                .query_async(&mut conn)
                .await?;
        }

        Ok(ChallengeEntry {
            identity_key: identity_key.to_string(),
            challenge: challenge.to_string(),
            created_at,
            expires_at,
        })
    }

    async fn get(&self, identity_key: &str) -> Result<Option<ChallengeEntry>, AuthError> {
        let mut conn = self.get_connection().await?;
        let key = self.make_key(identity_key);

        let (value, ttl_remaining): (Option<String>, i64) = redis::pipe()
            .get(&key)
            .ttl(&key)
            .query_async(&mut conn)
            .await?;

        match value {
            Some(val) => {
                let now = time_utils::current_timestamp()?;
                Ok(Some(Self::parse_entry(identity_key, &val, ttl_remaining, now)?))
            }
            None => Ok(None),
        }
    }

    async fn remove_if(&self, identity_key: &str, challenge: &str) -> Result<bool, AuthError> {
        let mut conn = self.get_connection().await?;
        let key = self.make_key(identity_key);

        let deleted: i64 = Script::new(REMOVE_IF_SCRIPT)
            .key(&key)
            .arg(challenge)
            .invoke_async(&mut conn)
            .await?;

        Ok(deleted > 0)
    }

    async fn remove(&self, identity_key: &str) -> Result<bool, AuthError> {
        let mut conn = self.get_connection().await?;
        let key = self.make_key(identity_key);
        let deleted: i64 = conn.del(&key).await?;
        Ok(deleted > 0)
    }

    async fn cleanup_expired(&self, _now: i64) -> Result<usize, AuthError> {
        // Redis evicts expired keys itself.
        Ok(0)
    }

    async fn get_stats(&self) -> Result<StorageStats, AuthError> {
        let mut conn = self.get_connection().await?;

        let pattern = format!("{}:*", self.key_prefix);
        let keys = self.scan_keys(&pattern).await?;

        let info: String = redis::cmd("INFO").arg("memory").query_async(&mut conn).await?;
        let memory_usage = info
            .lines()
            .find(|line| line.starts_with("used_memory_human:"))
            .and_then(|line| line.split(':').nth(1))
            .map(str::trim)
            .unwrap_or("unknown");

        Ok(StorageStats {
            total_records: keys.len(),
            backend_info: format!(
                "Redis storage (memory: {}, prefix: {})",
                memory_usage, self.key_prefix
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests require a running Redis instance and return early without one.
    async fn get_test_storage() -> Option<RedisStorage> {
        let storage = RedisStorage::new("redis://localhost:6379", "test_registry_auth").ok()?;
        match storage.init().await {
            Ok(()) => Some(storage),
            Err(_) => {
                println!("Skipping Redis tests - no Redis server available");
                None
            }
        }
    }

    #[test]
    fn test_parse_entry() {
        let entry = RedisStorage::parse_entry("0xabc", "1700000000|Login nonce: 12", 120, 1700000100)
            .unwrap();
        assert_eq!(entry.created_at, 1700000000);
        assert_eq!(entry.challenge, "Login nonce: 12");
        assert_eq!(entry.expires_at, 1700000220);

        assert!(RedisStorage::parse_entry("0xabc", "garbage", 10, 0).is_err());
    }

    #[tokio::test]
    async fn test_redis_storage_upsert_and_remove_if() {
        let Some(storage) = get_test_storage().await else {
            return;
        };

        storage
            .upsert("0xredis1", "Login nonce: 1", Duration::from_secs(60))
            .await
            .unwrap();
        storage
            .upsert("0xredis1", "Login nonce: 2", Duration::from_secs(60))
            .await
            .unwrap();

        let entry = storage.get("0xredis1").await.unwrap().unwrap();
        assert_eq!(entry.challenge, "Login nonce: 2");

        assert!(!storage.remove_if("0xredis1", "Login nonce: 1").await.unwrap());
        assert!(storage.remove_if("0xredis1", "Login nonce: 2").await.unwrap());
        assert!(storage.get("0xredis1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redis_storage_ttl() {
        let Some(storage) = get_test_storage().await else {
            return;
        };

        storage
            .upsert("0xredis2", "Login nonce: 3", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(storage.get("0xredis2").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(storage.get("0xredis2").await.unwrap().is_none());
    }
}
