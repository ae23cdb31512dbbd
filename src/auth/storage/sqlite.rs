//! SQLite storage backend implementation.
//!
//! This module provides a persistent SQLite storage backend for login
//! challenges. It suits single-instance deployments that need challenges to
//! survive a restart.

use super::{ChallengeEntry, ChallengeStorage, StorageStats};
use crate::AuthError;
use crate::auth::time_utils;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// SQLite-based storage backend for login challenges.
///
/// One row per identity key; `upsert` uses `INSERT ... ON CONFLICT DO UPDATE`
/// and `remove_if` is a single conditional `DELETE`, so both are atomic under
/// SQLite's statement-level locking.
///
/// # Example
///
/// ```rust
/// use registry_auth::storage::SqliteStorage;
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), registry_auth::AuthError> {
/// let storage = Arc::new(SqliteStorage::new("challenges.db")?);
///
/// // Or use in-memory SQLite (for testing)
/// let memory_storage = Arc::new(SqliteStorage::new(":memory:")?);
/// # Ok(())
/// # }
/// ```
pub struct SqliteStorage {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Create a new SQLite storage backend.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the SQLite database file, or ":memory:" for in-memory database
    pub fn new(db_path: &str) -> Result<Self, AuthError> {
        let connection = if db_path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(db_path)
        }?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AuthError> {
        self.connection
            .lock()
            .map_err(|_| AuthError::from_storage_message("SQLite connection mutex poisoned"))
    }

    /// Create the database schema if it doesn't exist.
    fn init_schema(&self) -> Result<(), AuthError> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS challenge_record (
                identity_key TEXT PRIMARY KEY,
                challenge TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_expires_at ON challenge_record (expires_at)",
            [],
        )?;

        Ok(())
    }
}

#[async_trait]
impl ChallengeStorage for SqliteStorage {
    async fn init(&self) -> Result<(), AuthError> {
        self.init_schema()
    }

    async fn upsert(
        &self,
        identity_key: &str,
        challenge: &str,
        ttl: Duration,
    ) -> Result<ChallengeEntry, AuthError> {
        let created_at = time_utils::current_timestamp()?;
        let expires_at = time_utils::expires_at(created_at, ttl);

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO challenge_record (identity_key, challenge, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(identity_key) DO UPDATE SET
                challenge = excluded.challenge,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
            params![identity_key, challenge, created_at, expires_at],
        )?;

        Ok(ChallengeEntry {
            identity_key: identity_key.to_string(),
            challenge: challenge.to_string(),
            created_at,
            expires_at,
        })
    }

    async fn get(&self, identity_key: &str) -> Result<Option<ChallengeEntry>, AuthError> {
        let now = time_utils::current_timestamp()?;
        let conn = self.lock()?;

        let entry = conn
            .query_row(
                "SELECT identity_key, challenge, created_at, expires_at FROM challenge_record \
                 WHERE identity_key = ?1 AND expires_at > ?2",
                params![identity_key, now],
                |row| {
                    Ok(ChallengeEntry {
                        identity_key: row.get(0)?,
                        challenge: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(entry)
    }

    async fn remove_if(&self, identity_key: &str, challenge: &str) -> Result<bool, AuthError> {
        let conn = self.lock()?;
        let changes = conn.execute(
            "DELETE FROM challenge_record WHERE identity_key = ?1 AND challenge = ?2",
            params![identity_key, challenge],
        )?;
        Ok(changes > 0)
    }

    async fn remove(&self, identity_key: &str) -> Result<bool, AuthError> {
        let conn = self.lock()?;
        let changes = conn.execute(
            "DELETE FROM challenge_record WHERE identity_key = ?1",
            params![identity_key],
        )?;
        Ok(changes > 0)
    }

    async fn cleanup_expired(&self, now: i64) -> Result<usize, AuthError> {
        let conn = self.lock()?;
        let changes = conn.execute(
            "DELETE FROM challenge_record WHERE expires_at <= ?1",
            params![now],
        )?;
        Ok(changes)
    }

    async fn get_stats(&self) -> Result<StorageStats, AuthError> {
        let conn = self.lock()?;

        let count: usize =
            conn.query_row("SELECT COUNT(*) FROM challenge_record", [], |row| row.get(0))?;

        let page_count: i64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap_or(0);
        let page_size: i64 = conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .unwrap_or(4096);

        Ok(StorageStats {
            total_records: count,
            backend_info: format!(
                "SQLite storage ({} bytes, {} pages)",
                page_count * page_size,
                page_count
            ),
        })
    }
}
