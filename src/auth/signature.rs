//! Wallet signature verification.
//!
//! Clients sign the challenge text with their wallet using the Ethereum
//! personal-message scheme (EIP-191). The verifier recovers the signer's
//! address from the signature; the caller then compares it with the claimed
//! identity.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::AuthError;

const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Recovers the identity that produced a signature over a challenge.
///
/// The default implementation is [`WalletSignatureVerifier`]. Tests and other
/// chains can provide their own.
pub trait SignatureVerifier: Send + Sync {
    /// Recovers the signer's identity key (normalized) from `signature` over `message`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSignature`] when the signature cannot be
    /// decoded or no public key can be recovered from it.
    fn recover_identity(&self, message: &str, signature: &str) -> Result<String, AuthError>;

    /// Compares a claimed and a recovered identity.
    fn identities_match(&self, claimed: &str, recovered: &str) -> bool {
        claimed.trim().eq_ignore_ascii_case(recovered.trim())
    }
}

/// EIP-191 personal-message verifier for secp256k1 wallets.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalletSignatureVerifier;

impl WalletSignatureVerifier {
    pub fn new() -> Self {
        Self
    }
}

impl SignatureVerifier for WalletSignatureVerifier {
    fn recover_identity(&self, message: &str, signature: &str) -> Result<String, AuthError> {
        let bytes = decode_signature(signature)?;
        let prehash = personal_message_hash(message);

        let mut sig = Signature::from_slice(&bytes[..64]).map_err(|_| AuthError::InvalidSignature)?;
        let mut recovery_id = parse_recovery_id(bytes[64])?;

        // Wallets may emit high-S signatures; the curve library only recovers low-S.
        if let Some(normalized) = sig.normalize_s() {
            sig = normalized;
            recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
        }

        let key = VerifyingKey::recover_from_prehash(&prehash, &sig, recovery_id)
            .map_err(|_| AuthError::InvalidSignature)?;

        Ok(address_of(&key))
    }
}

/// Hashes `message` the way wallets do for `personal_sign`.
pub fn personal_message_hash(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Derives the lower-case `0x` address of a public key.
pub fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Returns true if `value` looks like a 20-byte hex wallet address.
pub fn is_wallet_address(value: &str) -> bool {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex_part) => hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

fn decode_signature(signature: &str) -> Result<[u8; 65], AuthError> {
    let trimmed = signature.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(hex_part).map_err(|_| AuthError::InvalidSignature)?;
    bytes.try_into().map_err(|_| AuthError::InvalidSignature)
}

fn parse_recovery_id(v: u8) -> Result<RecoveryId, AuthError> {
    let normalized = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        _ => return Err(AuthError::InvalidSignature),
    };
    RecoveryId::from_byte(normalized).ok_or(AuthError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    // Private key 0x...01 controls this well-known address.
    const KEY_ONE_ADDRESS: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

    fn key_one() -> SigningKey {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        SigningKey::from_slice(&bytes).unwrap()
    }

    fn sign(key: &SigningKey, message: &str, v_offset: u8) -> (Signature, u8) {
        let (sig, recid) = key
            .sign_prehash_recoverable(&personal_message_hash(message))
            .unwrap();
        (sig, recid.to_byte() + v_offset)
    }

    fn encode(sig: &Signature, v: u8) -> String {
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(v);
        format!("0x{}", hex::encode(bytes))
    }

    #[test]
    fn test_address_of_known_key() {
        assert_eq!(address_of(key_one().verifying_key()), KEY_ONE_ADDRESS);
    }

    #[test]
    fn test_recover_with_legacy_v() {
        let verifier = WalletSignatureVerifier::new();
        let (sig, v) = sign(&key_one(), "Login nonce: 12345", 27);

        let recovered = verifier
            .recover_identity("Login nonce: 12345", &encode(&sig, v))
            .unwrap();
        assert_eq!(recovered, KEY_ONE_ADDRESS);
    }

    #[test]
    fn test_recover_with_raw_v_and_no_prefix() {
        let verifier = WalletSignatureVerifier::new();
        let (sig, v) = sign(&key_one(), "Login nonce: 1", 0);
        let encoded = encode(&sig, v);

        let recovered = verifier
            .recover_identity("Login nonce: 1", encoded.trim_start_matches("0x"))
            .unwrap();
        assert_eq!(recovered, KEY_ONE_ADDRESS);
    }

    #[test]
    fn test_recover_high_s_signature() {
        let verifier = WalletSignatureVerifier::new();
        let (sig, v) = sign(&key_one(), "Login nonce: 99", 0);

        // Flip to the equivalent high-S form: s' = n - s, parity inverted.
        let (r, s) = sig.split_scalars();
        let high = Signature::from_scalars(r, -s).unwrap();
        let flipped_v = (v ^ 1) + 27;

        let recovered = verifier
            .recover_identity("Login nonce: 99", &encode(&high, flipped_v))
            .unwrap();
        assert_eq!(recovered, KEY_ONE_ADDRESS);
    }

    #[test]
    fn test_other_message_recovers_other_address() {
        let verifier = WalletSignatureVerifier::new();
        let (sig, v) = sign(&key_one(), "Login nonce: 1", 27);

        let recovered = verifier
            .recover_identity("Login nonce: 2", &encode(&sig, v))
            .unwrap_or_default();
        assert_ne!(recovered, KEY_ONE_ADDRESS);
    }

    #[test]
    fn test_malformed_signatures() {
        let verifier = WalletSignatureVerifier::new();
        let too_short = "ab".repeat(64);
        let zero_scalars = "00".repeat(65);
        let bad_inputs: [&str; 6] = ["", "0x", "zz", "0x1234", &too_short, &zero_scalars];
        for bad in bad_inputs {
            assert!(
                matches!(
                    verifier.recover_identity("Login nonce: 1", bad),
                    Err(AuthError::InvalidSignature)
                ),
                "expected InvalidSignature for {bad:?}"
            );
        }

        let (sig, _) = sign(&key_one(), "Login nonce: 1", 0);
        assert!(matches!(
            verifier.recover_identity("Login nonce: 1", &encode(&sig, 5)),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_identities_match_ignores_case() {
        let verifier = WalletSignatureVerifier::new();
        assert!(verifier.identities_match(" 0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf", KEY_ONE_ADDRESS));
        assert!(!verifier.identities_match("0x0000000000000000000000000000000000000001", KEY_ONE_ADDRESS));
    }

    #[test]
    fn test_is_wallet_address() {
        assert!(is_wallet_address(KEY_ONE_ADDRESS));
        assert!(is_wallet_address("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"));
        assert!(!is_wallet_address("7e5f4552091a69125d5dfcb7b8c2659029395bdf"));
        assert!(!is_wallet_address("0x7e5f"));
        assert!(!is_wallet_address("0xzz5f4552091a69125d5dfcb7b8c2659029395bdf"));
    }
}
