//! External collaborators of the authentication flow.
//!
//! The flow never owns institute records, the approval allow-list or admin
//! accounts. It talks to them through the traits in this module. In-memory
//! implementations are provided for tests, demos and single-process setups.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::time_utils;
use crate::AuthError;

/// Lifecycle state of an institute record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Revoked,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Revoked => "revoked",
        };
        f.write_str(value)
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "revoked" => Ok(ApprovalStatus::Revoked),
            other => Err(AuthError::BadRequest(format!("Unknown status: {other}"))),
        }
    }
}

/// A registered institute, addressed by its wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub id: Uuid,
    /// Lower-case wallet address
    pub identity_key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub institute_type: String,
    pub institute_code: String,
    pub email: String,
    pub address: String,
    pub district: String,
    pub state: String,
    pub country: Option<String>,
    pub status: ApprovalStatus,
    pub created_at: i64,
}

/// Registration request for a new institute.
///
/// Every field defaults to empty so that missing fields surface as a
/// [`AuthError::BadRequest`] from [`validate`](Self::validate) rather than a
/// deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewInstitute {
    pub name: String,
    #[serde(rename = "type")]
    pub institute_type: String,
    pub institute_code: String,
    pub email: String,
    pub wallet_address: String,
    pub address: String,
    pub district: String,
    pub state: String,
    pub country: Option<String>,
}

impl NewInstitute {
    /// Checks required fields and the wallet address format.
    pub fn validate(&self) -> Result<(), AuthError> {
        let required = [
            &self.name,
            &self.institute_type,
            &self.institute_code,
            &self.email,
            &self.wallet_address,
            &self.address,
            &self.district,
            &self.state,
        ];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err(AuthError::BadRequest("Missing required fields".to_string()));
        }
        if !super::signature::is_wallet_address(&self.wallet_address) {
            return Err(AuthError::BadRequest("Invalid wallet address".to_string()));
        }
        Ok(())
    }
}

/// An administrative (government) account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub id: Uuid,
    pub username: String,
    /// bcrypt hash of the password
    pub password_hash: String,
}

impl AdminAccount {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }
}

/// Reference to a ledger transaction that changed an approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TxRef(pub String);

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage of institute records.
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    /// Looks up a record by its normalized identity key.
    async fn find_by_identity_key(&self, identity_key: &str)
    -> Result<Option<IdentityRecord>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<IdentityRecord>, AuthError>;

    /// Stores a new `pending` record.
    ///
    /// Fails with `BadRequest("Institute already registered")` when the
    /// wallet, institute code or email is already taken.
    async fn insert(&self, institute: NewInstitute) -> Result<IdentityRecord, AuthError>;

    /// Lists records, optionally restricted to one status.
    async fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<IdentityRecord>, AuthError>;

    /// Updates the status of a record and returns the updated record.
    async fn set_status(&self, id: Uuid, status: ApprovalStatus)
    -> Result<IdentityRecord, AuthError>;
}

/// The allow-list of identities permitted to act, typically an on-chain registry.
#[async_trait]
pub trait ApprovalLedger: Send + Sync {
    async fn is_approved(&self, identity_key: &str) -> Result<bool, AuthError>;

    async fn grant_approval(&self, identity_key: &str) -> Result<TxRef, AuthError>;

    async fn revoke_approval(&self, identity_key: &str) -> Result<TxRef, AuthError>;
}

/// Lookup of administrative accounts.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn find_admin(&self, username: &str) -> Result<Option<AdminAccount>, AuthError>;

    async fn find_admin_by_id(&self, id: Uuid) -> Result<Option<AdminAccount>, AuthError>;
}

/// In-memory [`IdentityRegistry`].
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    records: Arc<RwLock<HashMap<Uuid, IdentityRecord>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityRegistry for MemoryRegistry {
    async fn find_by_identity_key(
        &self,
        identity_key: &str,
    ) -> Result<Option<IdentityRecord>, AuthError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.identity_key.eq_ignore_ascii_case(identity_key))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<IdentityRecord>, AuthError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn insert(&self, institute: NewInstitute) -> Result<IdentityRecord, AuthError> {
        let identity_key = institute.wallet_address.trim().to_lowercase();
        let mut records = self.records.write().await;

        let duplicate = records.values().any(|r| {
            r.identity_key == identity_key
                || r.institute_code == institute.institute_code
                || r.email.eq_ignore_ascii_case(&institute.email)
        });
        if duplicate {
            return Err(AuthError::BadRequest(
                "Institute already registered".to_string(),
            ));
        }

        let record = IdentityRecord {
            id: Uuid::new_v4(),
            identity_key,
            name: institute.name,
            institute_type: institute.institute_type,
            institute_code: institute.institute_code,
            email: institute.email,
            address: institute.address,
            district: institute.district,
            state: institute.state,
            country: institute.country,
            status: ApprovalStatus::Pending,
            created_at: time_utils::current_timestamp()?,
        };
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<IdentityRecord>, AuthError> {
        let records = self.records.read().await;
        let mut matching: Vec<IdentityRecord> = records
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        matching.sort_by_key(|r| (r.created_at, r.institute_code.clone()));
        Ok(matching)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ApprovalStatus,
    ) -> Result<IdentityRecord, AuthError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(AuthError::IdentityNotFound)?;
        record.status = status;
        Ok(record.clone())
    }
}

/// In-memory [`ApprovalLedger`] that mints random transaction hashes.
///
/// [`set_available`](Self::set_available) simulates an unreachable ledger.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    approved: Arc<RwLock<HashSet<String>>>,
    available: Arc<AtomicBool>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self {
            approved: Arc::default(),
            available: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles whether ledger calls succeed.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), AuthError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AuthError::LedgerError("ledger unavailable".to_string()))
        }
    }

    fn mint_tx_ref() -> TxRef {
        let bytes: [u8; 32] = rand::random();
        TxRef(format!("0x{}", hex::encode(bytes)))
    }
}

#[async_trait]
impl ApprovalLedger for MemoryLedger {
    async fn is_approved(&self, identity_key: &str) -> Result<bool, AuthError> {
        self.ensure_available()?;
        let key = identity_key.trim().to_lowercase();
        Ok(self.approved.read().await.contains(&key))
    }

    async fn grant_approval(&self, identity_key: &str) -> Result<TxRef, AuthError> {
        self.ensure_available()?;
        self.approved
            .write()
            .await
            .insert(identity_key.trim().to_lowercase());
        Ok(Self::mint_tx_ref())
    }

    async fn revoke_approval(&self, identity_key: &str) -> Result<TxRef, AuthError> {
        self.ensure_available()?;
        self.approved
            .write()
            .await
            .remove(&identity_key.trim().to_lowercase());
        Ok(Self::mint_tx_ref())
    }
}

/// In-memory [`AdminDirectory`].
#[derive(Debug, Default, Clone)]
pub struct MemoryAdminDirectory {
    accounts: Arc<RwLock<HashMap<String, AdminAccount>>>,
}

impl MemoryAdminDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an account, keyed by username.
    pub async fn add_admin(&self, account: AdminAccount) {
        self.accounts
            .write()
            .await
            .insert(account.username.clone(), account);
    }
}

#[async_trait]
impl AdminDirectory for MemoryAdminDirectory {
    async fn find_admin(&self, username: &str) -> Result<Option<AdminAccount>, AuthError> {
        Ok(self.accounts.read().await.get(username).cloned())
    }

    async fn find_admin_by_id(&self, id: Uuid) -> Result<Option<AdminAccount>, AuthError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.id == id)
            .cloned())
    }
}
