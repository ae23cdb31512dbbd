use std::sync::Arc;
use std::time::Duration;

use super::cleanup::{BoxedCleanupStrategy, HybridCleanupStrategy};
use super::limiter::AttemptLimiter;
use super::storage::{ChallengeEntry, ChallengeStorage, StorageStats};
use super::time_utils;
use crate::AuthError;

/// Prefix of every challenge text handed to clients for signing.
pub const CHALLENGE_PREFIX: &str = "Login nonce: ";

/// Normalizes a client-supplied identity key: trimmed and lower-cased.
///
/// Wallet addresses arrive in checksummed mixed case from some wallets and in
/// lower case from others; both must address the same challenge.
pub fn normalize_identity(raw: &str) -> Result<String, AuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::BadRequest("identityKey is required".to_string()));
    }
    Ok(trimmed.to_lowercase())
}

/// Generates a fresh challenge text with 64 bits of entropy.
pub fn generate_challenge() -> String {
    let value: u64 = rand::random();
    format!("{CHALLENGE_PREFIX}{value}")
}

/// Issues, looks up and invalidates login challenges.
///
/// Wraps a [`ChallengeStorage`] backend with challenge generation, identity
/// normalization and background expiry sweeps. Every identity has at most one
/// live challenge; a new request replaces the previous one.
///
/// When an [`AttemptLimiter`] is attached, each background sweep also drops
/// its lapsed failure windows.
pub struct NonceStore {
    storage: Arc<dyn ChallengeStorage>,
    ttl: Duration,
    cleanup_strategy: BoxedCleanupStrategy,
    limiter: Option<Arc<AttemptLimiter>>,
}

impl NonceStore {
    /// Creates a store with the default hybrid cleanup strategy.
    pub fn new(storage: Arc<dyn ChallengeStorage>, ttl: Duration) -> Self {
        Self::with_cleanup_strategy(storage, ttl, Box::new(HybridCleanupStrategy::default()))
    }

    pub fn with_cleanup_strategy(
        storage: Arc<dyn ChallengeStorage>,
        ttl: Duration,
        cleanup_strategy: BoxedCleanupStrategy,
    ) -> Self {
        Self {
            storage,
            ttl,
            cleanup_strategy,
            limiter: None,
        }
    }

    /// Prunes `limiter` on every background sweep.
    pub fn with_limiter(mut self, limiter: Arc<AttemptLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Initializes the storage backend (e.g., creates database tables).
    pub(crate) async fn init(&self) -> Result<(), AuthError> {
        self.storage.init().await
    }

    /// Issues a new challenge for `identity_key`, replacing any previous one.
    ///
    /// After the challenge is stored the cleanup strategy is consulted and,
    /// if it fires, expired challenges are swept on a background task.
    pub async fn request_challenge(&self, identity_key: &str) -> Result<ChallengeEntry, AuthError> {
        let identity_key = normalize_identity(identity_key)?;
        let challenge = generate_challenge();

        let entry = self
            .storage
            .upsert(&identity_key, &challenge, self.ttl)
            .await?;
        tracing::debug!(identity_key = %entry.identity_key, expires_at = entry.expires_at, "challenge issued");

        self.maybe_trigger_cleanup().await;

        Ok(entry)
    }

    /// Returns the live challenge for `identity_key` without removing it.
    ///
    /// An expired challenge is reported exactly like a missing one.
    pub async fn consume_challenge(&self, identity_key: &str) -> Result<ChallengeEntry, AuthError> {
        let identity_key = normalize_identity(identity_key)?;
        self.storage
            .get(&identity_key)
            .await?
            .ok_or(AuthError::ChallengeMissing)
    }

    /// Deletes the challenge only if it is still `challenge`.
    ///
    /// Returns `false` when the challenge was consumed by a concurrent login
    /// or replaced by a newer request in the meantime.
    pub async fn invalidate(&self, identity_key: &str, challenge: &str) -> Result<bool, AuthError> {
        let identity_key = normalize_identity(identity_key)?;
        self.storage.remove_if(&identity_key, challenge).await
    }

    /// Removes all challenges that expired before now.
    pub async fn cleanup_expired_challenges(&self) -> Result<usize, AuthError> {
        Self::sweep(&self.storage).await
    }

    async fn sweep(storage: &Arc<dyn ChallengeStorage>) -> Result<usize, AuthError> {
        let now = time_utils::current_timestamp()?;
        storage.cleanup_expired(now).await
    }

    async fn maybe_trigger_cleanup(&self) {
        if self.cleanup_strategy.should_cleanup().await {
            self.spawn_background_cleanup();
            self.cleanup_strategy.mark_as_cleaned().await;
        }
    }

    fn spawn_background_cleanup(&self) {
        let storage = Arc::clone(&self.storage);
        let limiter = self.limiter.clone();

        tokio::spawn(async move {
            match Self::sweep(&storage).await {
                Ok(removed) => tracing::debug!(removed, "expired challenges swept"),
                Err(e) => tracing::warn!("Background cleanup failed: {}", e),
            }
            if let Some(limiter) = limiter {
                let pruned = limiter.prune();
                if pruned > 0 {
                    tracing::debug!(pruned, "lapsed lockout windows dropped");
                }
            }
        });
    }

    /// Returns the configured challenge TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns statistics from the storage backend.
    pub async fn stats(&self) -> Result<StorageStats, AuthError> {
        self.storage.get_stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::cleanup::CustomCleanupStrategy;
    use crate::storage::MemoryStorage;

    fn store(ttl: Duration) -> NonceStore {
        NonceStore::new(Arc::new(MemoryStorage::new()), ttl)
    }

    #[test]
    fn test_normalize_identity() {
        assert_eq!(normalize_identity("  0xAbCd ").unwrap(), "0xabcd");
        assert!(matches!(
            normalize_identity("   "),
            Err(AuthError::BadRequest(_))
        ));
    }

    #[test]
    fn test_generate_challenge_format() {
        let challenge = generate_challenge();
        let number = challenge.strip_prefix(CHALLENGE_PREFIX).unwrap();
        assert!(number.parse::<u64>().is_ok());
        assert_ne!(generate_challenge(), generate_challenge());
    }

    #[tokio::test]
    async fn test_request_replaces_previous_challenge() -> Result<(), AuthError> {
        let store = store(Duration::from_secs(300));

        let first = store.request_challenge("0xABC").await?;
        let second = store.request_challenge("0xabc").await?;
        assert_eq!(second.identity_key, "0xabc");

        let live = store.consume_challenge("0xAbc").await?;
        assert_eq!(live.challenge, second.challenge);
        assert_ne!(live.challenge, first.challenge);

        // The replaced challenge can no longer be invalidated
        assert!(!store.invalidate("0xabc", &first.challenge).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_consume_is_a_peek() -> Result<(), AuthError> {
        let store = store(Duration::from_secs(300));
        let issued = store.request_challenge("0xabc").await?;

        store.consume_challenge("0xabc").await?;
        let again = store.consume_challenge("0xabc").await?;
        assert_eq!(again.challenge, issued.challenge);
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_challenge_is_missing() -> Result<(), AuthError> {
        let store = store(Duration::ZERO);
        store.request_challenge("0xabc").await?;

        assert!(matches!(
            store.consume_challenge("0xabc").await,
            Err(AuthError::ChallengeMissing)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalidate_once() -> Result<(), AuthError> {
        let store = store(Duration::from_secs(300));
        let issued = store.request_challenge("0xabc").await?;

        assert!(store.invalidate("0xABC", &issued.challenge).await?);
        assert!(!store.invalidate("0xabc", &issued.challenge).await?);
        assert!(matches!(
            store.consume_challenge("0xabc").await,
            Err(AuthError::ChallengeMissing)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_cleanup_expired_challenges() -> Result<(), AuthError> {
        let storage = Arc::new(MemoryStorage::new());
        let expired = NonceStore::new(storage.clone(), Duration::ZERO);
        let live = NonceStore::new(storage.clone(), Duration::from_secs(300));

        expired.request_challenge("0xold").await?;
        live.request_challenge("0xnew").await?;

        assert_eq!(live.cleanup_expired_challenges().await?, 1);
        assert_eq!(live.stats().await?.total_records, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_background_cleanup_triggered() -> Result<(), AuthError> {
        let storage = Arc::new(MemoryStorage::new());
        let store = NonceStore::with_cleanup_strategy(
            storage.clone(),
            Duration::ZERO,
            Box::new(CustomCleanupStrategy::new(|| async { true })),
        );

        store.request_challenge("0xabc").await?;

        // Give the spawned sweep a moment to run
        for _ in 0..50 {
            if storage.get_stats().await?.total_records == 0 {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background sweep did not remove the expired challenge");
    }

    #[tokio::test]
    async fn test_background_cleanup_prunes_limiter() -> Result<(), AuthError> {
        let limiter = Arc::new(AttemptLimiter::new(5, Duration::from_millis(50)));
        let store = NonceStore::with_cleanup_strategy(
            Arc::new(MemoryStorage::new()),
            Duration::from_secs(300),
            Box::new(CustomCleanupStrategy::new(|| async { true })),
        )
        .with_limiter(Arc::clone(&limiter));

        for i in 0..20 {
            limiter.record_failure(&format!("0x{i:040x}"));
        }
        assert_eq!(limiter.tracked(), 20);

        tokio::time::sleep(Duration::from_millis(80)).await;
        store.request_challenge("0xabc").await?;

        for _ in 0..50 {
            if limiter.tracked() == 0 {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background sweep left {} lapsed windows", limiter.tracked());
    }
}
