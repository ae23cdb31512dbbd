//! # Registry Auth
//!
//! Wallet challenge/response and credential authentication for a
//! certificate-issuance registry.
//!
//! Institutes prove control of a wallet by signing a one-time challenge;
//! government administrators log in with a username and password. Both paths
//! end in a signed session token delivered as an `HttpOnly` cookie.
//!
//! ## Features
//!
//! - **One challenge per identity**: requesting a new challenge replaces the old one
//! - **Replay prevention**: a successful login consumes its challenge with an
//!   atomic compare-and-delete
//! - **EIP-191 signatures**: secp256k1 public-key recovery over the personal-message hash
//! - **Approval gating**: only identities listed by the approval ledger can log in
//! - **Lockout**: repeated signature or password failures lock an identity for a window
//! - **Pluggable storage**: in-memory, SQLite (`sqlite-storage`) or Redis (`redis-storage`)
//! - **HTTP surface**: an axum router with cookie handling and status mapping
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use registry_auth::{AuthConfig, AuthFlow, ConfigPreset};
//! use registry_auth::auth::{MemoryAdminDirectory, MemoryLedger, MemoryRegistry};
//!
//! # async fn example() -> Result<(), registry_auth::AuthError> {
//! let config = AuthConfig::new("0123456789abcdef0123456789abcdef", ConfigPreset::Development);
//! let flow = AuthFlow::builder(config)
//!     .with_registry(Arc::new(MemoryRegistry::new()))
//!     .with_ledger(Arc::new(MemoryLedger::new()))
//!     .with_admins(Arc::new(MemoryAdminDirectory::new()))
//!     .build_and_init()
//!     .await?;
//!
//! // The client signs this text with its wallet and posts the signature back.
//! let challenge = flow.request_challenge("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf").await?;
//! assert!(challenge.challenge.starts_with("Login nonce: "));
//!
//! // Serve it over HTTP
//! let app = registry_auth::http::router(Arc::new(flow));
//! # let _ = app;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! [`AuthConfig::from_env`] reads:
//!
//! ```bash
//! export REGISTRY_AUTH_JWT_SECRET="at-least-32-bytes-of-server-secret"
//! export REGISTRY_AUTH_ENV=production        # Secure + SameSite=None cookie
//! export REGISTRY_AUTH_ACCESS_TTL=3600       # session lifetime, seconds
//! export REGISTRY_AUTH_CHALLENGE_TTL=300     # challenge lifetime, seconds
//! export REGISTRY_AUTH_MAX_FAILED_ATTEMPTS=5
//! ```
//!
//! ## Architecture
//!
//! - **[`AuthFlow`]**: the orchestrator; every operation returns `Result<_, AuthError>`
//! - **[`auth::NonceStore`]**: challenge issuance, lookup and invalidation over a
//!   [`storage::ChallengeStorage`] backend
//! - **[`SessionIssuer`]**: HS256 session tokens
//! - **[`auth::registry`]**: the identity registry, approval ledger and admin directory
//!   collaborators
//! - **[`http`]**: the only layer that knows about status codes and cookies

pub mod auth;
pub mod http;

pub use auth::storage;

// Re-export commonly used types
pub use auth::{
    AuthConfig, AuthError, AuthFlow, ConfigPreset, IdentityKind, SameSitePolicy, SessionClaims,
    SessionIssuer,
};
