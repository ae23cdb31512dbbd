use thiserror::Error;

/// Error types that can occur during registry authentication.
///
/// Every orchestrator, store and collaborator operation returns
/// `Result<T, AuthError>`. The HTTP layer maps each variant onto a status
/// code (see [`crate::http`]); nothing else in the crate deals in status codes.
///
/// # Error Categories
///
/// - **Request Errors**: `BadRequest`
/// - **Authentication Errors**: `ChallengeMissing`, `InvalidSignature`,
///   `SignatureMismatch`, `AuthFailed`, `MissingToken`, `TokenExpired`, `InvalidToken`
/// - **Authorization Errors**: `NotAuthorized`, `IdentityNotFound`,
///   `AlreadyInDesiredState`, `TooManyAttempts`
/// - **System Errors**: `StorageError`, `CryptoError`, `LedgerError`, `ConfigError`
///
/// # Example
///
/// ```rust
/// use registry_auth::AuthError;
///
/// fn describe(err: &AuthError) -> &'static str {
///     match err {
///         AuthError::ChallengeMissing => "request a new challenge",
///         AuthError::SignatureMismatch => "signed with the wrong wallet",
///         AuthError::NotAuthorized => "institute is not approved",
///         e if e.is_internal() => "try again later",
///         _ => "rejected",
///     }
/// }
///
/// assert_eq!(describe(&AuthError::ChallengeMissing), "request a new challenge");
/// ```
#[derive(Error, Debug)]
pub enum AuthError {
    /// A required field was missing or malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No live challenge exists for the identity.
    ///
    /// Returned when the challenge was never requested, has expired, was
    /// replaced by a newer request, or was already consumed by a successful
    /// login (including a concurrent one that won the race).
    ///
    /// # Resolution
    ///
    /// The client should request a fresh challenge and sign it again.
    #[error("Challenge not found or expired")]
    ChallengeMissing,

    /// The signature bytes could not be parsed or no key could be recovered.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The signature is well formed but recovers to a different identity.
    ///
    /// The challenge stays live so a corrected retry is possible within the
    /// TTL window, bounded by the attempt limiter.
    #[error("Signature does not match identity")]
    SignatureMismatch,

    /// Username or password did not match an administrative account.
    #[error("Invalid credentials")]
    AuthFailed,

    /// The request carried neither a session cookie nor a bearer token.
    #[error("No session token provided")]
    MissingToken,

    /// The session token signature is intact but its expiry has passed.
    #[error("Session token expired")]
    TokenExpired,

    /// The session token is malformed, tampered with, or signed with another key.
    #[error("Invalid session token")]
    InvalidToken,

    /// The identity authenticated but is not allowed to act.
    ///
    /// For wallet logins this means the approval ledger does not list the
    /// address; for administrative routes it means the session role is wrong.
    #[error("Identity is not authorized")]
    NotAuthorized,

    /// No identity record matches the key or identifier.
    #[error("Identity not found")]
    IdentityNotFound,

    /// The requested state change is already in effect.
    #[error("Already in desired state: {0}")]
    AlreadyInDesiredState(String),

    /// Too many failed attempts for this identity inside the lockout window.
    #[error("Too many failed attempts, try again later")]
    TooManyAttempts,

    /// A challenge storage operation failed.
    ///
    /// # When This Occurs
    ///
    /// - The backing database or Redis server is unreachable
    /// - A schema or query error in a persistent backend
    #[error("Storage error: {0}")]
    StorageError(String),

    /// A cryptographic primitive failed (token encoding, hashing, clock).
    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// The external approval ledger rejected or failed a call.
    #[error("Ledger error: {0}")]
    LedgerError(String),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AuthError {
    /// Creates a storage error from any displayable backend message.
    pub fn from_storage_message(message: impl Into<String>) -> Self {
        Self::StorageError(message.into())
    }

    /// Returns true for infrastructure failures whose details must not reach the caller.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::StorageError(_) | Self::CryptoError(_) | Self::LedgerError(_) | Self::ConfigError(_)
        )
    }

    /// Returns true for failures that count against the attempt limiter.
    pub(crate) fn counts_as_failed_attempt(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature | Self::SignatureMismatch | Self::AuthFailed
        )
    }
}

#[cfg(feature = "sqlite-storage")]
impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

#[cfg(feature = "redis-storage")]
impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        Self::StorageError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            AuthError::ChallengeMissing.to_string(),
            "Challenge not found or expired"
        );
        assert_eq!(AuthError::InvalidSignature.to_string(), "Invalid signature");
        assert_eq!(
            AuthError::SignatureMismatch.to_string(),
            "Signature does not match identity"
        );
        assert_eq!(AuthError::AuthFailed.to_string(), "Invalid credentials");

        let bad = AuthError::BadRequest("identityKey is required".to_string());
        assert_eq!(bad.to_string(), "Bad request: identityKey is required");

        let storage = AuthError::from_storage_message("connection refused");
        assert_eq!(storage.to_string(), "Storage error: connection refused");
    }

    #[test]
    fn test_internal_classification() {
        assert!(AuthError::StorageError("x".into()).is_internal());
        assert!(AuthError::LedgerError("x".into()).is_internal());
        assert!(AuthError::CryptoError("x".into()).is_internal());
        assert!(AuthError::ConfigError("x".into()).is_internal());
        assert!(!AuthError::ChallengeMissing.is_internal());
        assert!(!AuthError::NotAuthorized.is_internal());
    }

    #[test]
    fn test_failed_attempt_classification() {
        assert!(AuthError::SignatureMismatch.counts_as_failed_attempt());
        assert!(AuthError::InvalidSignature.counts_as_failed_attempt());
        assert!(AuthError::AuthFailed.counts_as_failed_attempt());
        assert!(!AuthError::ChallengeMissing.counts_as_failed_attempt());
        assert!(!AuthError::NotAuthorized.counts_as_failed_attempt());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AuthError>();
    }
}
