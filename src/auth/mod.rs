// Core architecture components
mod config;
mod error;
mod time_utils;

// Challenge lifecycle
pub mod cleanup;
pub mod nonce_store;
pub mod storage;

// Credentials and sessions
pub mod limiter;
pub mod password;
pub mod session;
pub mod signature;

// Collaborators and orchestration
pub mod approval;
pub mod flow;
pub mod registry;

// Core components exports
pub use config::{
    AuthConfig, ConfigPreset, ENV_ACCESS_TTL, ENV_CHALLENGE_TTL, ENV_DEPLOYMENT, ENV_JWT_SECRET,
    ENV_MAX_FAILED_ATTEMPTS, SameSitePolicy,
};
pub use error::AuthError;

// Challenge exports
pub use cleanup::{
    BoxedCleanupStrategy, CleanupStrategy, CustomCleanupStrategy, HybridCleanupStrategy,
};
pub use nonce_store::NonceStore;
pub use storage::{ChallengeEntry, ChallengeStorage, MemoryStorage, StorageStats};

// Credential and session exports
pub use limiter::AttemptLimiter;
pub use session::{IdentityKind, IssuedSession, SessionClaims, SessionIssuer};
pub use signature::{SignatureVerifier, WalletSignatureVerifier};

// Orchestration exports
pub use approval::{ApprovalDesk, ApprovalReceipt};
pub use flow::{AdminProfile, AuthFlow, AuthFlowBuilder, LoginSuccess, Profile};
pub use registry::{
    AdminAccount, AdminDirectory, ApprovalLedger, ApprovalStatus, IdentityRecord,
    IdentityRegistry, MemoryAdminDirectory, MemoryLedger, MemoryRegistry, NewInstitute, TxRef,
};
