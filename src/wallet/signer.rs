//! Signing credential
//!
//! SECURITY: This is the ONLY place where a decrypted private key lives.
//! - Keys are held in alloy's PrivateKeySigner
//! - Keys are never serialized except through the keystore encryption path
//! - Keys are never logged

use crate::{Error, Result};
use alloy::consensus::{SignableTransaction, Signed, TxLegacy};
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use secrecy::zeroize::Zeroizing;

/// An account identity able to sign transactions
///
/// The private key is:
/// - Stored in alloy's PrivateKeySigner (zeroized by k256 on drop)
/// - Never serialized (no Serialize impl)
/// - Only accessible via signing operations and [`Credential::secret_bytes`]
pub struct Credential {
    /// The signer
    signer: PrivateKeySigner,
    /// Public address (safe to expose)
    address: Address,
}

impl Credential {
    /// Create a credential from a hex-encoded private key
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| Error::Signing(format!("Invalid private key: {}", e)))?;

        Ok(Self::from_signer(signer))
    }

    /// Create a credential from raw private key bytes
    pub fn from_bytes(key: &[u8]) -> Result<Self> {
        if key.len() != 32 {
            return Err(Error::Signing(format!(
                "Private key must be 32 bytes, got {}",
                key.len()
            )));
        }

        let signer = PrivateKeySigner::from_bytes(&B256::from_slice(key))
            .map_err(|e| Error::Signing(format!("Invalid private key: {}", e)))?;

        Ok(Self::from_signer(signer))
    }

    fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self { signer, address }
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the address as a checksummed string
    pub fn address_string(&self) -> String {
        self.address.to_checksum(None)
    }

    /// Raw private key bytes, for re-encryption only
    pub(crate) fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signer.to_bytes().0)
    }

    /// Sign a legacy transaction
    ///
    /// The signature is deterministic (RFC 6979) for a given key and payload.
    pub fn sign_legacy(&self, mut tx: TxLegacy) -> Result<Signed<TxLegacy>> {
        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| Error::Signing(format!("Signing failed for {}: {}", self.address, e)))?;

        Ok(tx.into_signed(signature))
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, TxKind, U256};

    // Test private key (DO NOT use in production!)
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn sample_tx() -> TxLegacy {
        TxLegacy {
            chain_id: Some(1),
            nonce: 7,
            gas_price: 50_000_000_000,
            gas_limit: 21_000,
            to: TxKind::Call(Address::repeat_byte(0x11)),
            value: U256::from(1u64),
            input: Bytes::new(),
        }
    }

    #[test]
    fn test_credential_from_hex() {
        let credential = Credential::from_hex(TEST_KEY).unwrap();

        assert_eq!(
            credential.address_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_from_bytes_matches_from_hex() {
        let from_hex = Credential::from_hex(TEST_KEY).unwrap();
        let from_bytes = Credential::from_bytes(from_hex.secret_bytes().as_slice()).unwrap();
        assert_eq!(from_hex.address(), from_bytes.address());
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        let err = Credential::from_bytes(&[1u8; 31]).unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }

    #[test]
    fn test_zero_key_is_unusable() {
        let err = Credential::from_bytes(&[0u8; 32]).unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let credential = Credential::from_hex(TEST_KEY).unwrap();

        let debug_str = format!("{:?}", credential);

        assert!(!debug_str.contains("ac0974bec"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_signing_is_deterministic_and_recoverable() {
        let credential = Credential::from_hex(TEST_KEY).unwrap();

        let first = credential.sign_legacy(sample_tx()).unwrap();
        let second = credential.sign_legacy(sample_tx()).unwrap();
        assert_eq!(first.hash(), second.hash());
        assert_eq!(first.signature(), second.signature());

        let recovered = first
            .signature()
            .recover_address_from_prehash(&first.signature_hash())
            .unwrap();
        assert_eq!(recovered, credential.address());
    }
}
