#![allow(dead_code)]

use std::sync::Arc;

use k256::ecdsa::SigningKey;
use registry_auth::auth::password::hash_password_with_cost;
use registry_auth::auth::signature::{address_of, personal_message_hash};
use registry_auth::auth::{
    AdminAccount, ApprovalLedger, IdentityRecord, IdentityRegistry, MemoryAdminDirectory,
    MemoryLedger, MemoryRegistry, NewInstitute,
};
use registry_auth::{AuthConfig, AuthFlow, ConfigPreset};

pub const SECRET: &str = "0123456789abcdef0123456789abcdef";
pub const ADMIN_USER: &str = "gov";
pub const ADMIN_PASSWORD: &str = "s3cret";

pub struct Harness {
    pub flow: Arc<AuthFlow>,
    pub registry: MemoryRegistry,
    pub ledger: MemoryLedger,
}

pub fn config() -> AuthConfig {
    AuthConfig::new(SECRET, ConfigPreset::Development)
}

/// Deterministic wallet derived from a one-byte private key.
pub fn wallet_key(seed: u8) -> (SigningKey, String) {
    let mut bytes = [0u8; 32];
    bytes[31] = seed;
    let key = SigningKey::from_slice(&bytes).unwrap();
    let wallet = address_of(key.verifying_key());
    (key, wallet)
}

/// Signs `message` the way a wallet's `personal_sign` does, with v in {27, 28}.
pub fn sign(key: &SigningKey, message: &str) -> String {
    let (sig, recid) = key
        .sign_prehash_recoverable(&personal_message_hash(message))
        .unwrap();
    let mut bytes = sig.to_bytes().to_vec();
    bytes.push(recid.to_byte() + 27);
    format!("0x{}", hex::encode(bytes))
}

pub fn institute(wallet: &str, code: &str) -> NewInstitute {
    NewInstitute {
        name: format!("Institute {code}"),
        institute_type: "university".into(),
        institute_code: code.into(),
        email: format!("{}@registry.example", code.to_lowercase()),
        wallet_address: wallet.into(),
        address: "1 Main St".into(),
        district: "North".into(),
        state: "State".into(),
        country: Some("Country".into()),
    }
}

/// Registers and approves an institute for `wallet`.
pub async fn enroll(harness: &Harness, wallet: &str, code: &str) -> IdentityRecord {
    let record = harness.registry.insert(institute(wallet, code)).await.unwrap();
    harness.ledger.grant_approval(wallet).await.unwrap();
    record
}

pub async fn harness_with(config: AuthConfig) -> Harness {
    let registry = MemoryRegistry::new();
    let ledger = MemoryLedger::new();
    let admins = MemoryAdminDirectory::new();
    admins
        .add_admin(AdminAccount::new(
            ADMIN_USER,
            hash_password_with_cost(ADMIN_PASSWORD, 4).unwrap(),
        ))
        .await;

    let flow = AuthFlow::builder(config)
        .with_registry(Arc::new(registry.clone()))
        .with_ledger(Arc::new(ledger.clone()))
        .with_admins(Arc::new(admins))
        .build_and_init()
        .await
        .unwrap();

    Harness {
        flow: Arc::new(flow),
        registry,
        ledger,
    }
}

pub async fn harness() -> Harness {
    harness_with(config()).await
}
