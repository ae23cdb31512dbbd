use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::approval::ApprovalDesk;
use super::cleanup::{BoxedCleanupStrategy, CustomCleanupStrategy, HybridCleanupStrategy};
use super::config::AuthConfig;
use super::limiter::AttemptLimiter;
use super::nonce_store::{NonceStore, normalize_identity};
use super::password;
use super::registry::{AdminDirectory, ApprovalLedger, IdentityRecord, IdentityRegistry};
use super::session::{IdentityKind, IssuedSession, SessionClaims, SessionIssuer};
use super::signature::{SignatureVerifier, WalletSignatureVerifier};
use super::storage::{ChallengeEntry, ChallengeStorage, MemoryStorage};
use crate::AuthError;

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    /// Normalized wallet address, or the username for credential logins
    pub identity_key: String,
    pub session: IssuedSession,
}

/// Public view of an administrative account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminProfile {
    pub id: Uuid,
    pub username: String,
    pub role: IdentityKind,
}

/// Profile of the principal behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Profile {
    Institute(IdentityRecord),
    Government(AdminProfile),
}

/// Orchestrates challenge issuance, wallet and credential logins, and
/// session verification.
///
/// A wallet login succeeds only when a live challenge exists for the
/// identity, the signature over it recovers to that identity, and the
/// approval ledger lists the identity. On success the challenge is consumed
/// with a compare-and-delete, so a challenge can back at most one session.
///
/// To create an instance, use [`AuthFlow::builder`].
pub struct AuthFlow {
    config: AuthConfig,
    nonces: NonceStore,
    verifier: Arc<dyn SignatureVerifier>,
    sessions: SessionIssuer,
    registry: Arc<dyn IdentityRegistry>,
    ledger: Arc<dyn ApprovalLedger>,
    admins: Arc<dyn AdminDirectory>,
    limiter: Arc<AttemptLimiter>,
    approvals: ApprovalDesk,
}

impl AuthFlow {
    /// Creates a builder; challenge storage defaults to [`MemoryStorage`].
    pub fn builder(config: AuthConfig) -> AuthFlowBuilder {
        AuthFlowBuilder::new(config)
    }

    /// Issues a fresh challenge for `identity_key`, replacing any previous one.
    pub async fn request_challenge(&self, identity_key: &str) -> Result<ChallengeEntry, AuthError> {
        self.nonces.request_challenge(identity_key).await
    }

    /// Logs an institute in with a wallet signature over its current challenge.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if either argument is blank
    /// - `TooManyAttempts` if the identity is locked out
    /// - `ChallengeMissing` if no live challenge exists, or a concurrent
    ///   login consumed it first
    /// - `InvalidSignature` / `SignatureMismatch` for a bad signature
    /// - `NotAuthorized` if the ledger does not list the identity
    /// - `IdentityNotFound` if the registry has no record for it
    ///
    /// Every failure except the lost race leaves the challenge live.
    pub async fn login_with_signature(
        &self,
        identity_key: &str,
        signature: &str,
    ) -> Result<LoginSuccess, AuthError> {
        let identity_key = normalize_identity(identity_key)?;
        if signature.trim().is_empty() {
            return Err(AuthError::BadRequest("signature is required".to_string()));
        }

        self.limiter.check(&identity_key)?;

        let challenge = self.nonces.consume_challenge(&identity_key).await?;

        let recovered = self
            .verifier
            .recover_identity(&challenge.challenge, signature)
            .inspect_err(|e| self.note_failure(&identity_key, e))?;

        if !self.verifier.identities_match(&identity_key, &recovered) {
            let err = AuthError::SignatureMismatch;
            self.note_failure(&identity_key, &err);
            return Err(err);
        }

        if !self.ledger.is_approved(&identity_key).await? {
            tracing::info!(identity_key = %identity_key, "login refused, identity not approved");
            return Err(AuthError::NotAuthorized);
        }

        let record = self
            .registry
            .find_by_identity_key(&identity_key)
            .await?
            .ok_or(AuthError::IdentityNotFound)?;

        let session = self.sessions.issue(
            &record.id.to_string(),
            &record.identity_key,
            IdentityKind::Institute,
            self.config.access_ttl,
        )?;

        if !self
            .nonces
            .invalidate(&identity_key, &challenge.challenge)
            .await?
        {
            tracing::info!(identity_key = %identity_key, "challenge consumed by a concurrent login");
            return Err(AuthError::ChallengeMissing);
        }

        self.limiter.reset(&identity_key);
        tracing::info!(identity_key = %identity_key, role = %IdentityKind::Institute, "login succeeded");

        Ok(LoginSuccess {
            identity_key,
            session,
        })
    }

    /// Logs an administrative account in with username and password.
    ///
    /// An unknown username and a wrong password both fail with `AuthFailed`.
    pub async fn login_with_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginSuccess, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::BadRequest(
                "Username and password required".to_string(),
            ));
        }

        let limiter_key = format!("admin:{username}");
        self.limiter.check(&limiter_key)?;

        let account = match self.admins.find_admin(username).await? {
            Some(account) if password::verify_password(password, &account.password_hash)? => {
                account
            }
            _ => {
                let err = AuthError::AuthFailed;
                self.note_failure(&limiter_key, &err);
                return Err(err);
            }
        };

        let session = self.sessions.issue(
            &account.id.to_string(),
            &account.username,
            IdentityKind::Government,
            self.config.access_ttl,
        )?;

        self.limiter.reset(&limiter_key);
        tracing::info!(identity_key = %account.username, role = %IdentityKind::Government, "login succeeded");

        Ok(LoginSuccess {
            identity_key: account.username,
            session,
        })
    }

    /// Verifies a session token and returns its claims.
    pub fn verify_session(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.sessions.verify(token)
    }

    /// Fails with `NotAuthorized` unless the session belongs to a government account.
    pub fn require_government(&self, claims: &SessionClaims) -> Result<(), AuthError> {
        match claims.role {
            IdentityKind::Government => Ok(()),
            IdentityKind::Institute => Err(AuthError::NotAuthorized),
        }
    }

    /// Resolves the record behind a verified session.
    pub async fn profile(&self, claims: &SessionClaims) -> Result<Profile, AuthError> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        match claims.role {
            IdentityKind::Institute => self
                .registry
                .find_by_id(id)
                .await?
                .map(Profile::Institute)
                .ok_or(AuthError::IdentityNotFound),
            IdentityKind::Government => self
                .admins
                .find_admin_by_id(id)
                .await?
                .map(|account| {
                    Profile::Government(AdminProfile {
                        id: account.id,
                        username: account.username,
                        role: IdentityKind::Government,
                    })
                })
                .ok_or(AuthError::IdentityNotFound),
        }
    }

    /// Government operations on institute records.
    pub fn approvals(&self) -> &ApprovalDesk {
        &self.approvals
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn nonces(&self) -> &NonceStore {
        &self.nonces
    }

    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    pub fn limiter(&self) -> &AttemptLimiter {
        &self.limiter
    }

    fn note_failure(&self, key: &str, err: &AuthError) {
        if err.counts_as_failed_attempt() {
            let failures = self.limiter.record_failure(key);
            tracing::warn!(identity_key = %key, failures, error = %err, "login attempt failed");
        }
    }
}

/// A builder for creating an [`AuthFlow`].
///
/// The identity registry, approval ledger and admin directory have no
/// defaults and must be supplied.
#[must_use = "The builder does nothing unless `.build_and_init()` is called."]
pub struct AuthFlowBuilder {
    config: AuthConfig,
    storage: Arc<dyn ChallengeStorage>,
    cleanup_strategy: Option<BoxedCleanupStrategy>,
    verifier: Arc<dyn SignatureVerifier>,
    registry: Option<Arc<dyn IdentityRegistry>>,
    ledger: Option<Arc<dyn ApprovalLedger>>,
    admins: Option<Arc<dyn AdminDirectory>>,
}

impl AuthFlowBuilder {
    fn new(config: AuthConfig) -> Self {
        Self {
            config,
            storage: Arc::new(MemoryStorage::new()),
            cleanup_strategy: None,
            verifier: Arc::new(WalletSignatureVerifier::new()),
            registry: None,
            ledger: None,
            admins: None,
        }
    }

    /// Specifies a challenge storage backend instead of the default `MemoryStorage`.
    pub fn with_storage<T: ChallengeStorage + 'static>(mut self, storage: Arc<T>) -> Self {
        self.storage = storage;
        self
    }

    /// Replaces the EIP-191 wallet verifier.
    pub fn with_verifier<T: SignatureVerifier + 'static>(mut self, verifier: Arc<T>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_registry<T: IdentityRegistry + 'static>(mut self, registry: Arc<T>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_ledger<T: ApprovalLedger + 'static>(mut self, ledger: Arc<T>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_admins<T: AdminDirectory + 'static>(mut self, admins: Arc<T>) -> Self {
        self.admins = Some(admins);
        self
    }

    /// Configures the expired-challenge sweep with custom hybrid thresholds.
    ///
    /// By default a sweep runs every 100 challenge requests or every 5 minutes.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use std::sync::Arc;
    /// # use std::time::Duration;
    /// # use registry_auth::{AuthConfig, AuthFlow, ConfigPreset};
    /// # use registry_auth::auth::registry::{MemoryAdminDirectory, MemoryLedger, MemoryRegistry};
    /// #
    /// # async fn example() -> Result<(), registry_auth::AuthError> {
    /// let config = AuthConfig::new("0123456789abcdef0123456789abcdef", ConfigPreset::Development);
    /// let flow = AuthFlow::builder(config)
    ///     .with_registry(Arc::new(MemoryRegistry::new()))
    ///     .with_ledger(Arc::new(MemoryLedger::new()))
    ///     .with_admins(Arc::new(MemoryAdminDirectory::new()))
    ///     .with_hybrid_cleanup_thresholds(50, Duration::from_secs(120))
    ///     .build_and_init()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_hybrid_cleanup_thresholds(
        mut self,
        count_threshold: u32,
        time_threshold: std::time::Duration,
    ) -> Self {
        let strategy = HybridCleanupStrategy::new(count_threshold, time_threshold);
        self.cleanup_strategy = Some(Box::new(strategy));
        self
    }

    /// Configures the expired-challenge sweep with a user-provided closure.
    ///
    /// The closure runs after every issued challenge and returns whether a
    /// sweep should start.
    pub fn with_custom_cleanup_strategy<F, Fut>(mut self, strategy_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let strategy = CustomCleanupStrategy::new(strategy_fn);
        self.cleanup_strategy = Some(Box::new(strategy));
        self
    }

    /// Builds the flow and initializes the challenge storage backend.
    pub async fn build_and_init(self) -> Result<AuthFlow, AuthError> {
        let registry = self
            .registry
            .ok_or_else(|| AuthError::ConfigError("identity registry not configured".into()))?;
        let ledger = self
            .ledger
            .ok_or_else(|| AuthError::ConfigError("approval ledger not configured".into()))?;
        let admins = self
            .admins
            .ok_or_else(|| AuthError::ConfigError("admin directory not configured".into()))?;

        for warning in self.config.validate() {
            tracing::warn!("{}", warning);
        }

        let cleanup_strategy = self
            .cleanup_strategy
            .unwrap_or_else(|| Box::new(HybridCleanupStrategy::default()));
        let limiter = Arc::new(AttemptLimiter::new(
            self.config.max_failed_attempts,
            self.config.lockout_window,
        ));
        let nonces = NonceStore::with_cleanup_strategy(
            self.storage,
            self.config.challenge_ttl,
            cleanup_strategy,
        )
        .with_limiter(Arc::clone(&limiter));
        nonces.init().await?;

        tracing::debug!(config = %self.config.summary(), "auth flow initialized");

        Ok(AuthFlow {
            sessions: SessionIssuer::new(&self.config),
            limiter,
            approvals: ApprovalDesk::new(Arc::clone(&registry), Arc::clone(&ledger)),
            config: self.config,
            nonces,
            verifier: self.verifier,
            registry,
            ledger,
            admins,
        })
    }
}
