use std::fmt;
use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::config::AuthConfig;
use super::time_utils;
use crate::AuthError;

/// The kind of principal a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    /// An approved institute that logged in with its wallet.
    Institute,
    /// An administrative account that logged in with username and password.
    Government,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKind::Institute => f.write_str("institute"),
            IdentityKind::Government => f.write_str("government"),
        }
    }
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Internal record id of the principal
    pub sub: String,
    /// Wallet address for institutes, username for government accounts
    pub identity_key: String,
    pub role: IdentityKind,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly minted session token with its decoded claims.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub claims: SessionClaims,
}

/// Mints and verifies HS256 session tokens.
///
/// Verification is stateless: a token stays valid until it expires. There
/// is no server-side revocation list.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    default_ttl: Duration,
}

impl fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl SessionIssuer {
    /// Creates an issuer that signs with `config.secret` and defaults to `config.access_ttl`.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            default_ttl: config.access_ttl,
        }
    }

    /// Lifetime applied by [`issue_default`](Self::issue_default).
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Mints a session for `subject` that expires after `ttl`.
    pub fn issue(
        &self,
        subject: &str,
        identity_key: &str,
        role: IdentityKind,
        ttl: Duration,
    ) -> Result<IssuedSession, AuthError> {
        let iat = time_utils::current_timestamp()?;
        let claims = SessionClaims {
            sub: subject.to_string(),
            identity_key: identity_key.to_string(),
            role,
            iat,
            exp: time_utils::expires_at(iat, ttl),
        };
        let token = self.encode_claims(&claims)?;
        Ok(IssuedSession { token, claims })
    }

    /// Mints a session with the configured default TTL.
    pub fn issue_default(
        &self,
        subject: &str,
        identity_key: &str,
        role: IdentityKind,
    ) -> Result<IssuedSession, AuthError> {
        self.issue(subject, identity_key, role, self.default_ttl)
    }

    /// Signs arbitrary claims as a token.
    pub fn encode_claims(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::CryptoError(format!("Token encoding failed: {e}")))
    }

    /// Verifies a token's signature and expiry and returns its claims.
    ///
    /// A token is expired from the second `exp` onwards, the same rule
    /// challenges follow. Any failure other than expiry, including an
    /// unparseable token or a foreign signing key, is reported as
    /// [`AuthError::InvalidToken`].
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?;

        // jsonwebtoken still accepts `exp == now`
        if time_utils::is_expired_at(claims.exp, time_utils::current_timestamp()?) {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }
}
