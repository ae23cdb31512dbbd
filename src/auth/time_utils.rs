//! Time utilities for safe timestamp handling.
//!
//! All stored timestamps are unix seconds as `i64`. These helpers return an
//! error instead of panicking if the system clock is before the epoch.

use crate::auth::error::AuthError;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current timestamp in seconds since Unix epoch.
pub(crate) fn current_timestamp() -> Result<i64, AuthError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .map_err(|_| AuthError::CryptoError("System time is before Unix epoch".to_string()))
}

/// Expiry timestamp for a record created at `created_at` with the given TTL.
pub(crate) fn expires_at(created_at: i64, ttl: Duration) -> i64 {
    created_at.saturating_add(ttl.as_secs() as i64)
}

/// A record is expired once `now` reaches its expiry timestamp.
pub(crate) fn is_expired_at(expires_at: i64, now: i64) -> bool {
    now >= expires_at
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_timestamp() {
        let ts = current_timestamp().unwrap();
        // Should be a reasonable timestamp (after year 2020)
        assert!(ts > 1577836800);
    }

    #[test]
    fn test_expires_at() {
        assert_eq!(expires_at(1_000, Duration::from_secs(300)), 1_300);
        assert_eq!(expires_at(1_000, Duration::ZERO), 1_000);
        assert_eq!(expires_at(i64::MAX, Duration::from_secs(10)), i64::MAX);
    }

    #[test]
    fn test_is_expired_at() {
        assert!(!is_expired_at(1_300, 1_299));
        assert!(is_expired_at(1_300, 1_300));
        assert!(is_expired_at(1_300, 1_301));
    }
}
