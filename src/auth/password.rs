//! bcrypt password hashing for administrative accounts.

use crate::AuthError;

/// Cost factor used by [`hash_password`].
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

/// Hashes `password` with the default bcrypt cost.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    hash_password_with_cost(password, DEFAULT_COST)
}

/// Hashes `password` with an explicit bcrypt cost (4..=31).
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost)
        .map_err(|e| AuthError::CryptoError(format!("Password hashing failed: {e}")))
}

/// Checks `password` against a stored bcrypt hash.
///
/// A malformed stored hash is a [`AuthError::CryptoError`], not a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, password_hash)
        .map_err(|e| AuthError::CryptoError(format!("Password verification failed: {e}")))
}
