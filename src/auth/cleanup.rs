use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Decides when expired challenges are swept from storage.
///
/// [`NonceStore`](crate::auth::nonce_store::NonceStore) asks after every
/// issued challenge. Reads already hide expired challenges, so a sweep only
/// reclaims space and its timing never affects login outcomes.
#[async_trait]
pub trait CleanupStrategy: Send + Sync {
    /// Returns true if a sweep should start now.
    async fn should_cleanup(&self) -> bool;

    /// Called once a sweep has been started.
    async fn mark_as_cleaned(&self);
}

/// Sweeps after `issue_threshold` challenges or once `interval` has passed
/// since the last sweep, whichever comes first.
#[derive(Debug)]
pub struct HybridCleanupStrategy {
    issue_threshold: u32,
    interval: Duration,
    issued_since_sweep: AtomicU32,
    last_sweep: Mutex<Instant>,
}

impl HybridCleanupStrategy {
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use registry_auth::auth::cleanup::HybridCleanupStrategy;
    ///
    /// let strategy = HybridCleanupStrategy::new(100, Duration::from_secs(300));
    /// assert_eq!(strategy.thresholds(), (100, Duration::from_secs(300)));
    /// ```
    pub fn new(issue_threshold: u32, interval: Duration) -> Self {
        Self {
            issue_threshold,
            interval,
            issued_since_sweep: AtomicU32::new(0),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Returns the `(challenges, interval)` thresholds.
    pub fn thresholds(&self) -> (u32, Duration) {
        (self.issue_threshold, self.interval)
    }

    fn since_last_sweep(&self) -> Duration {
        self.last_sweep
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

#[async_trait]
impl CleanupStrategy for HybridCleanupStrategy {
    async fn should_cleanup(&self) -> bool {
        let issued = self.issued_since_sweep.fetch_add(1, Ordering::SeqCst) + 1;
        issued >= self.issue_threshold || self.since_last_sweep() >= self.interval
    }

    async fn mark_as_cleaned(&self) {
        self.issued_since_sweep.store(0, Ordering::SeqCst);
        *self
            .last_sweep
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }
}

impl Default for HybridCleanupStrategy {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(300))
    }
}

/// Delegates the sweep decision to an async closure.
///
/// The closure owns whatever state it needs; `mark_as_cleaned` is a no-op.
pub struct CustomCleanupStrategy<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    decide: F,
}

impl<F, Fut> CustomCleanupStrategy<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    pub fn new(decide: F) -> Self {
        Self { decide }
    }
}

#[async_trait]
impl<F, Fut> CleanupStrategy for CustomCleanupStrategy<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn should_cleanup(&self) -> bool {
        (self.decide)().await
    }

    async fn mark_as_cleaned(&self) {}
}

pub type BoxedCleanupStrategy = Box<dyn CleanupStrategy>;
