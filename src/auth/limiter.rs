use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::AuthError;

#[derive(Debug, Clone, Copy)]
struct FailureWindow {
    failures: u32,
    window_start: Instant,
}

/// Per-identity failed-attempt counter with a fixed lockout window.
///
/// An identity that accumulates `max_failures` failed signature or credential
/// attempts within `window` is refused with [`AuthError::TooManyAttempts`]
/// until the window runs out. A successful login clears the counter.
///
/// Counters are keyed on the claimed identity, not on the caller. Anyone can
/// therefore lock an identity out for one window by posting bad signatures
/// for it; the same caller could already displace its live challenge with a
/// new request, so the limiter accepts that exposure in exchange for bounding
/// guesses per identity.
///
/// Lapsed windows are dropped by [`prune`](Self::prune), which the
/// [`NonceStore`](crate::auth::NonceStore) background sweep calls.
#[derive(Debug)]
pub struct AttemptLimiter {
    entries: DashMap<String, FailureWindow>,
    max_failures: u32,
    window: Duration,
}

impl AttemptLimiter {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_failures,
            window,
        }
    }

    /// Fails with `TooManyAttempts` if `key` is currently locked out.
    pub fn check(&self, key: &str) -> Result<(), AuthError> {
        let now = Instant::now();
        let locked = match self.entries.get(key) {
            Some(entry) => {
                now.duration_since(entry.window_start) < self.window
                    && entry.failures >= self.max_failures
            }
            None => false,
        };

        if locked {
            tracing::warn!(identity_key = %key, "login attempt refused, identity locked out");
            return Err(AuthError::TooManyAttempts);
        }
        Ok(())
    }

    /// Records one failed attempt for `key` and returns the count in the current window.
    pub fn record_failure(&self, key: &str) -> u32 {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert(FailureWindow {
            failures: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.failures = 0;
            entry.window_start = now;
        }
        entry.failures += 1;
        entry.failures
    }

    /// Clears the counter for `key`.
    pub fn reset(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Number of identities with a counter, lapsed ones included.
    pub fn tracked(&self) -> usize {
        self.entries.len()
    }

    /// Drops counters whose window has passed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) < self.window);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locks_after_max_failures() {
        let limiter = AttemptLimiter::new(3, Duration::from_secs(300));

        for expected in 1..=3 {
            assert!(limiter.check("0xabc").is_ok());
            assert_eq!(limiter.record_failure("0xabc"), expected);
        }

        assert!(matches!(
            limiter.check("0xabc"),
            Err(AuthError::TooManyAttempts)
        ));
        // Other identities are unaffected
        assert!(limiter.check("0xdef").is_ok());
    }

    #[test]
    fn test_reset_clears_lockout() {
        let limiter = AttemptLimiter::new(1, Duration::from_secs(300));
        limiter.record_failure("0xabc");
        assert!(limiter.check("0xabc").is_err());

        limiter.reset("0xabc");
        assert!(limiter.check("0xabc").is_ok());
    }

    #[test]
    fn test_window_expiry() {
        let limiter = AttemptLimiter::new(1, Duration::from_millis(50));
        limiter.record_failure("0xabc");
        assert!(limiter.check("0xabc").is_err());

        std::thread::sleep(Duration::from_millis(80));
        assert!(limiter.check("0xabc").is_ok());
        assert_eq!(limiter.prune(), 1);

        // A new window starts counting from one
        assert_eq!(limiter.record_failure("0xabc"), 1);
    }

    #[test]
    fn test_zero_threshold_locks_after_first_failure() {
        let limiter = AttemptLimiter::new(0, Duration::from_secs(300));
        limiter.record_failure("0xabc");
        assert!(limiter.check("0xabc").is_err());
        // Identities with no record are never locked
        assert!(limiter.check("0xnew").is_ok());
    }
}
