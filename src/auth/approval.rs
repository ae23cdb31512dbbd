//! Government operations on institute records.
//!
//! Approval state lives in two places: the record's `status` in the
//! registry and the allow-list on the ledger. The ledger is authoritative for
//! logins, so every change goes to the ledger first and the record is only
//! updated once the ledger call succeeded.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::registry::{
    ApprovalLedger, ApprovalStatus, IdentityRecord, IdentityRegistry, NewInstitute, TxRef,
};
use super::signature::is_wallet_address;
use crate::AuthError;

/// Outcome of an approve or revoke call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalReceipt {
    pub tx_hash: TxRef,
    pub record: IdentityRecord,
}

pub struct ApprovalDesk {
    registry: Arc<dyn IdentityRegistry>,
    ledger: Arc<dyn ApprovalLedger>,
}

impl ApprovalDesk {
    pub fn new(registry: Arc<dyn IdentityRegistry>, ledger: Arc<dyn ApprovalLedger>) -> Self {
        Self { registry, ledger }
    }

    /// Registers a new institute in `pending` state.
    pub async fn register_institute(
        &self,
        institute: NewInstitute,
    ) -> Result<IdentityRecord, AuthError> {
        institute.validate()?;
        let record = self.registry.insert(institute).await?;
        tracing::info!(identity_key = %record.identity_key, id = %record.id, "institute registered");
        Ok(record)
    }

    pub async fn list_institutes(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<IdentityRecord>, AuthError> {
        self.registry.list(status).await
    }

    /// Adds the institute's wallet to the ledger and marks the record approved.
    ///
    /// Fails with `AlreadyInDesiredState` if the ledger already lists the wallet.
    pub async fn approve(&self, id: &str, wallet: &str) -> Result<ApprovalReceipt, AuthError> {
        let record = self.resolve(id, wallet).await?;

        if self.ledger.is_approved(&record.identity_key).await? {
            return Err(AuthError::AlreadyInDesiredState(
                "Institute already approved".to_string(),
            ));
        }

        let tx_hash = self
            .ledger
            .grant_approval(&record.identity_key)
            .await
            .inspect_err(|e| tracing::error!(identity_key = %record.identity_key, error = %e, "ledger approval failed"))?;
        let record = self
            .registry
            .set_status(record.id, ApprovalStatus::Approved)
            .await?;

        tracing::info!(identity_key = %record.identity_key, tx_hash = %tx_hash, "institute approved");
        Ok(ApprovalReceipt { tx_hash, record })
    }

    /// Removes the institute's wallet from the ledger and marks the record revoked.
    ///
    /// Fails with `AlreadyInDesiredState` if the ledger does not list the wallet.
    pub async fn revoke(&self, id: &str, wallet: &str) -> Result<ApprovalReceipt, AuthError> {
        let record = self.resolve(id, wallet).await?;

        if !self.ledger.is_approved(&record.identity_key).await? {
            return Err(AuthError::AlreadyInDesiredState(
                "Institute not currently approved".to_string(),
            ));
        }

        let tx_hash = self
            .ledger
            .revoke_approval(&record.identity_key)
            .await
            .inspect_err(|e| tracing::error!(identity_key = %record.identity_key, error = %e, "ledger revocation failed"))?;
        let record = self
            .registry
            .set_status(record.id, ApprovalStatus::Revoked)
            .await?;

        tracing::info!(identity_key = %record.identity_key, tx_hash = %tx_hash, "institute revoked");
        Ok(ApprovalReceipt { tx_hash, record })
    }

    /// Validates the id and wallet pair and loads the record they name.
    async fn resolve(&self, id: &str, wallet: &str) -> Result<IdentityRecord, AuthError> {
        let invalid = || AuthError::BadRequest("Invalid ID or wallet address".to_string());

        let id = Uuid::parse_str(id.trim()).map_err(|_| invalid())?;
        if !is_wallet_address(wallet) {
            return Err(invalid());
        }

        let record = self
            .registry
            .find_by_id(id)
            .await?
            .ok_or(AuthError::IdentityNotFound)?;

        if !record.identity_key.eq_ignore_ascii_case(wallet.trim()) {
            return Err(AuthError::BadRequest(
                "walletAddress does not match institute".to_string(),
            ));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::registry::{MemoryLedger, MemoryRegistry};

    const WALLET: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

    fn institute(wallet: &str, code: &str) -> NewInstitute {
        NewInstitute {
            name: "Institute of Testing".to_string(),
            institute_type: "university".to_string(),
            institute_code: code.to_string(),
            email: format!("{code}@example.edu"),
            wallet_address: wallet.to_string(),
            address: "1 Campus Road".to_string(),
            district: "Central".to_string(),
            state: "Karnataka".to_string(),
            country: None,
        }
    }

    fn desk() -> (ApprovalDesk, MemoryRegistry, MemoryLedger) {
        let registry = MemoryRegistry::new();
        let ledger = MemoryLedger::new();
        let desk = ApprovalDesk::new(Arc::new(registry.clone()), Arc::new(ledger.clone()));
        (desk, registry, ledger)
    }

    #[tokio::test]
    async fn test_register_validates() -> Result<(), AuthError> {
        let (desk, _, _) = desk();

        let mut incomplete = institute(WALLET, "INST-1");
        incomplete.name.clear();
        assert!(matches!(
            desk.register_institute(incomplete).await,
            Err(AuthError::BadRequest(_))
        ));

        let record = desk.register_institute(institute(WALLET, "INST-1")).await?;
        assert_eq!(record.status, ApprovalStatus::Pending);
        assert_eq!(desk.list_institutes(Some(ApprovalStatus::Pending)).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_approve_then_revoke() -> Result<(), AuthError> {
        let (desk, _, ledger) = desk();
        let record = desk.register_institute(institute(WALLET, "INST-1")).await?;
        let id = record.id.to_string();

        let receipt = desk.approve(&id, WALLET).await?;
        assert_eq!(receipt.record.status, ApprovalStatus::Approved);
        assert!(receipt.tx_hash.0.starts_with("0x"));
        assert!(ledger.is_approved(WALLET).await?);

        assert!(matches!(
            desk.approve(&id, WALLET).await,
            Err(AuthError::AlreadyInDesiredState(_))
        ));

        let receipt = desk.revoke(&id, &WALLET.to_lowercase()).await?;
        assert_eq!(receipt.record.status, ApprovalStatus::Revoked);
        assert!(!ledger.is_approved(WALLET).await?);

        assert!(matches!(
            desk.revoke(&id, WALLET).await,
            Err(AuthError::AlreadyInDesiredState(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_approve_input_errors() -> Result<(), AuthError> {
        let (desk, _, _) = desk();
        let record = desk.register_institute(institute(WALLET, "INST-1")).await?;
        let id = record.id.to_string();

        assert!(matches!(
            desk.approve("not-a-uuid", WALLET).await,
            Err(AuthError::BadRequest(_))
        ));
        assert!(matches!(
            desk.approve(&id, "0x1234").await,
            Err(AuthError::BadRequest(_))
        ));
        assert!(matches!(
            desk.approve(&Uuid::new_v4().to_string(), WALLET).await,
            Err(AuthError::IdentityNotFound)
        ));
        assert!(matches!(
            desk.approve(&id, "0x0000000000000000000000000000000000000001").await,
            Err(AuthError::BadRequest(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_ledger_failure_leaves_record_unchanged() -> Result<(), AuthError> {
        let (desk, registry, ledger) = desk();
        let record = desk.register_institute(institute(WALLET, "INST-1")).await?;

        ledger.set_available(false);
        assert!(matches!(
            desk.approve(&record.id.to_string(), WALLET).await,
            Err(AuthError::LedgerError(_))
        ));

        let stored = registry.find_by_id(record.id).await?.unwrap();
        assert_eq!(stored.status, ApprovalStatus::Pending);
        Ok(())
    }
}
