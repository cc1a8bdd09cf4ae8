//! Encrypted keystore files (Web3 Secret Storage, version 3)
//!
//! ```json
//! {
//!   "address": "f39fd6e51aad88f6f4ce6ab8827279cfffb92266",
//!   "crypto": {
//!     "cipher": "aes-128-ctr",
//!     "cipherparams": { "iv": "..." },
//!     "ciphertext": "...",
//!     "kdf": "scrypt",
//!     "kdfparams": { "dklen": 32, "n": 8192, "p": 1, "r": 8, "salt": "..." },
//!     "mac": "..."
//!   },
//!   "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6",
//!   "version": 3
//! }
//! ```
//!
//! The derived key's first half keys AES-128-CTR; the second half is hashed
//! with the ciphertext into the MAC, which is checked before anything is
//! decrypted. The handler only reads files; persisting a re-encrypted
//! keystore is up to the caller.

use crate::wallet::Credential;
use crate::{Error, Result};
use aes::cipher::{KeyIvInit, StreamCipher};
use alloy::hex;
use alloy::primitives::keccak256;
use rand::RngCore;
use secrecy::zeroize::Zeroizing;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;
use subtle::ConstantTimeEq;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

const KEYSTORE_VERSION: u32 = 3;
const CIPHER: &str = "aes-128-ctr";
const DERIVED_KEY_LEN: usize = 32;

// Cost limits for parameters read from a file
const MAX_DERIVED_KEY_LEN: usize = 64;
const MAX_SCRYPT_MEMORY: u64 = 1 << 30;
const MAX_SCRYPT_P: u32 = 16;
const MAX_PBKDF2_ROUNDS: u32 = 10_000_000;

/// scrypt cost parameters written by [`encrypt_credential`]
pub const SCRYPT_LOG_N: u8 = 13;
pub const SCRYPT_R: u32 = 8;
pub const SCRYPT_P: u32 = 1;

/// A password-encrypted private key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoreFile {
    /// Lowercase hex address without `0x` (optional in files from some tools)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(alias = "Crypto")]
    pub crypto: CryptoSection,
    #[serde(default)]
    pub id: Option<String>,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoSection {
    pub cipher: String,
    pub cipherparams: CipherParams,
    pub ciphertext: String,
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub mac: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

/// Key derivation parameters, told apart by their fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KdfParams {
    Scrypt {
        dklen: usize,
        n: u64,
        r: u32,
        p: u32,
        salt: String,
    },
    Pbkdf2 {
        dklen: usize,
        c: u32,
        prf: String,
        salt: String,
    },
}

impl KdfParams {
    /// Value of the sibling `kdf` field
    pub fn name(&self) -> &'static str {
        match self {
            KdfParams::Scrypt { .. } => "scrypt",
            KdfParams::Pbkdf2 { .. } => "pbkdf2",
        }
    }

    fn derive_key(&self, password: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        match self {
            KdfParams::Scrypt {
                dklen,
                n,
                r,
                p,
                salt,
            } => {
                check_dklen(*dklen)?;
                if !n.is_power_of_two() || *n < 2 {
                    return Err(Error::InvalidKeystoreFormat(format!(
                        "scrypt n must be a power of two, got {}",
                        n
                    )));
                }
                let memory = 128u64
                    .checked_mul(u64::from(*r))
                    .and_then(|m| m.checked_mul(*n));
                if memory.map_or(true, |m| m > MAX_SCRYPT_MEMORY) {
                    return Err(Error::InvalidKeystoreFormat(format!(
                        "scrypt n = {}, r = {} needs more than {} bytes of memory",
                        n, r, MAX_SCRYPT_MEMORY
                    )));
                }
                if *p == 0 || *p > MAX_SCRYPT_P {
                    return Err(Error::InvalidKeystoreFormat(format!(
                        "scrypt p must be between 1 and {}, got {}",
                        MAX_SCRYPT_P, p
                    )));
                }
                // RFC 7914: n < 2^(16 * r)
                let log_n = n.trailing_zeros();
                if u64::from(log_n) >= 16 * u64::from(*r) {
                    return Err(Error::InvalidKeystoreFormat(format!(
                        "scrypt n = {} is too large for r = {} (log2(n) must be below 16 * r)",
                        n, r
                    )));
                }
                let log_n = log_n as u8;
                let params = scrypt::Params::new(log_n, *r, *p, *dklen).map_err(|e| {
                    Error::InvalidKeystoreFormat(format!("Invalid scrypt parameters: {}", e))
                })?;

                let salt = decode_field("salt", salt)?;
                let mut key = Zeroizing::new(vec![0u8; *dklen]);
                scrypt::scrypt(password, &salt, &params, key.as_mut_slice()).map_err(|e| {
                    Error::InvalidKeystoreFormat(format!("Invalid scrypt output length: {}", e))
                })?;
                Ok(key)
            }
            KdfParams::Pbkdf2 {
                dklen,
                c,
                prf,
                salt,
            } => {
                check_dklen(*dklen)?;
                if *c == 0 || *c > MAX_PBKDF2_ROUNDS {
                    return Err(Error::InvalidKeystoreFormat(format!(
                        "pbkdf2 c must be between 1 and {}, got {}",
                        MAX_PBKDF2_ROUNDS, c
                    )));
                }
                if prf != "hmac-sha256" {
                    return Err(Error::InvalidKeystoreFormat(format!(
                        "Unsupported pbkdf2 prf: {}",
                        prf
                    )));
                }

                let salt = decode_field("salt", salt)?;
                let mut key = Zeroizing::new(vec![0u8; *dklen]);
                pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, &salt, *c, key.as_mut_slice());
                Ok(key)
            }
        }
    }
}

fn check_dklen(dklen: usize) -> Result<()> {
    if !(DERIVED_KEY_LEN..=MAX_DERIVED_KEY_LEN).contains(&dklen) {
        return Err(Error::InvalidKeystoreFormat(format!(
            "dklen must be between {} and {}, got {}",
            DERIVED_KEY_LEN, MAX_DERIVED_KEY_LEN, dklen
        )));
    }
    Ok(())
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value.strip_prefix("0x").unwrap_or(value))
        .map_err(|e| Error::InvalidKeystoreFormat(format!("Invalid hex in `{}`: {}", name, e)))
}

fn mac_for(derived_key: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(16 + ciphertext.len());
    preimage.extend_from_slice(&derived_key[16..32]);
    preimage.extend_from_slice(ciphertext);
    keccak256(&preimage).0
}

fn apply_ctr(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()> {
    let mut cipher = Aes128Ctr::new_from_slices(key, iv).map_err(|_| {
        Error::InvalidKeystoreFormat(format!("IV must be 16 bytes, got {}", iv.len()))
    })?;
    cipher.apply_keystream(buf);
    Ok(())
}

impl KeystoreFile {
    /// Parse a keystore from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let keystore: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidKeystoreFormat(e.to_string()))?;

        if keystore.version != KEYSTORE_VERSION {
            return Err(Error::InvalidKeystoreFormat(format!(
                "Unsupported keystore version {}",
                keystore.version
            )));
        }
        if keystore.crypto.kdf != keystore.crypto.kdfparams.name() {
            return Err(Error::InvalidKeystoreFormat(format!(
                "kdf `{}` does not match its kdfparams",
                keystore.crypto.kdf
            )));
        }
        if keystore.crypto.cipher != CIPHER {
            return Err(Error::InvalidKeystoreFormat(format!(
                "Unsupported cipher {}",
                keystore.crypto.cipher
            )));
        }

        Ok(keystore)
    }

    /// Pretty-printed JSON, as written to disk
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decrypt the private key with `password`
    ///
    /// Fails with `DecryptionFailed` on a MAC mismatch (wrong password or
    /// tampered file) or when the key does not belong to `address`. No
    /// credential is built unless every check passes.
    pub fn decrypt(&self, password: &SecretString) -> Result<Credential> {
        let crypto = &self.crypto;
        let ciphertext = decode_field("ciphertext", &crypto.ciphertext)?;
        let iv = decode_field("iv", &crypto.cipherparams.iv)?;
        let expected_mac = decode_field("mac", &crypto.mac)?;

        let derived_key = crypto.kdfparams.derive_key(password.expose_secret().as_bytes())?;

        let mac = mac_for(&derived_key, &ciphertext);
        if !bool::from(mac.as_slice().ct_eq(expected_mac.as_slice())) {
            return Err(Error::DecryptionFailed(
                "MAC mismatch (wrong password?)".to_string(),
            ));
        }

        let mut secret = Zeroizing::new(ciphertext);
        apply_ctr(&derived_key[..16], &iv, secret.as_mut_slice())?;

        let credential = Credential::from_bytes(&secret)
            .map_err(|e| Error::DecryptionFailed(format!("Decrypted key is unusable: {}", e)))?;

        if let Some(address) = &self.address {
            let stored = address.strip_prefix("0x").unwrap_or(address).to_lowercase();
            let derived = hex::encode(credential.address());
            if stored != derived {
                return Err(Error::DecryptionFailed(format!(
                    "Decrypted key belongs to 0x{}, keystore claims 0x{}",
                    derived, stored
                )));
            }
        }

        Ok(credential)
    }
}

/// Read, parse and decrypt a keystore file
pub fn load_credential(path: &Path, password: &SecretString) -> Result<Credential> {
    let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let keystore = KeystoreFile::from_json(&json)?;
    let credential = keystore.decrypt(password)?;

    tracing::debug!(
        keyfile = %path.display(),
        address = %credential.address_string(),
        "Keystore decrypted"
    );
    Ok(credential)
}

/// Encrypt `credential` under `password` into a new keystore
///
/// Nothing is written to disk. Callers are expected to have confirmed the
/// password (see [`crate::wallet::password::read_new_password`]).
pub fn encrypt_credential(
    credential: &Credential,
    password: &SecretString,
) -> Result<KeystoreFile> {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; 32];
    let mut iv = [0u8; 16];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);

    let kdfparams = KdfParams::Scrypt {
        dklen: DERIVED_KEY_LEN,
        n: 1u64 << SCRYPT_LOG_N,
        r: SCRYPT_R,
        p: SCRYPT_P,
        salt: hex::encode(salt),
    };
    let derived_key = kdfparams.derive_key(password.expose_secret().as_bytes())?;

    let secret = credential.secret_bytes();
    let mut ciphertext = secret.to_vec();
    apply_ctr(&derived_key[..16], &iv, &mut ciphertext)?;
    let mac = mac_for(&derived_key, &ciphertext);

    Ok(KeystoreFile {
        address: Some(hex::encode(credential.address())),
        crypto: CryptoSection {
            cipher: CIPHER.to_string(),
            cipherparams: CipherParams {
                iv: hex::encode(iv),
            },
            ciphertext: hex::encode(&ciphertext),
            kdf: kdfparams.name().to_string(),
            kdfparams,
            mac: hex::encode(mac),
        },
        id: Some(uuid::Uuid::new_v4().to_string()),
        version: KEYSTORE_VERSION,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    // Test vectors from the Web3 Secret Storage definition (password "testpassword")
    const PBKDF2_VECTOR: &str = r#"{
        "crypto": {
            "cipher": "aes-128-ctr",
            "cipherparams": { "iv": "6087dab2f9fdbbfaddc31a909735c1e6" },
            "ciphertext": "5318b4d5bcd28de64ee5559e671353e16f075ecae9f99c7a79a38af5f869aa46",
            "kdf": "pbkdf2",
            "kdfparams": {
                "c": 262144,
                "dklen": 32,
                "prf": "hmac-sha256",
                "salt": "ae3cd4e7013836a3df6bd7241b12db061dbe2c6785853cce422d148a624ce0bd"
            },
            "mac": "517ead924a9d0dc3124507e3393d175ce3ff7c1e96529c6c555ce9e51205e9b2"
        },
        "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6",
        "version": 3
    }"#;

    // Same key and password under geth's light scrypt parameters (n = 4096, r = 8, p = 6)
    const SCRYPT_VECTOR: &str = r#"{
        "crypto": {
            "cipher": "aes-128-ctr",
            "cipherparams": { "iv": "4f1c2a9e7b3d5c8a6e0f1b2d3c4a5e6f" },
            "ciphertext": "c50744b0a3a42e74ecbcf0ba6db7f5cd1d46acf59b0607faa4e9179530db1445",
            "kdf": "scrypt",
            "kdfparams": {
                "dklen": 32,
                "n": 4096,
                "p": 6,
                "r": 8,
                "salt": "2d9c1a7ee8b06f1bb1c1ab0f7c1fd4a7d3e8b5c6e1f7a9b2c4d6e8f0a1b3c5d7"
            },
            "mac": "193d279b2f5049ccaa85fdd7de84187adfd5f02a98edee4d62ba7905f8099833"
        },
        "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6",
        "version": 3
    }"#;

    fn scrypt_vector_with(n: u64, r: u32, p: u32) -> String {
        SCRYPT_VECTOR
            .replace("\"n\": 4096", &format!("\"n\": {}", n))
            .replace("\"r\": 8", &format!("\"r\": {}", r))
            .replace("\"p\": 6", &format!("\"p\": {}", p))
    }

    fn decrypt_error(json: &str) -> Error {
        KeystoreFile::from_json(json)
            .unwrap()
            .decrypt(&password("testpassword"))
            .unwrap_err()
    }

    const VECTOR_KEY: &str = "7a28b5ba57c53603b0b07b56bba752f7784bf506fa95edc395f5cf6c7514fe9d";

    fn password(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn test_credential() -> Credential {
        Credential::from_hex(TEST_KEY).unwrap()
    }

    #[test]
    fn test_decrypts_pbkdf2_vector() {
        let keystore = KeystoreFile::from_json(PBKDF2_VECTOR).unwrap();
        let credential = keystore.decrypt(&password("testpassword")).unwrap();
        let expected = Credential::from_hex(VECTOR_KEY).unwrap();
        assert_eq!(credential.address(), expected.address());
    }

    #[test]
    fn test_decrypts_scrypt_vector() {
        let keystore = KeystoreFile::from_json(SCRYPT_VECTOR).unwrap();
        let credential = keystore.decrypt(&password("testpassword")).unwrap();
        let expected = Credential::from_hex(VECTOR_KEY).unwrap();
        assert_eq!(credential.address(), expected.address());
    }

    #[test]
    fn test_scrypt_n_beyond_rfc_limit_is_rejected() {
        // The Web3 Secret Storage scrypt example (n = 2^18, r = 1) breaks n < 2^(16 * r)
        let err = decrypt_error(&scrypt_vector_with(262_144, 1, 8));
        assert!(matches!(err, Error::InvalidKeystoreFormat(_)));
        assert_eq!(
            err.to_string(),
            "Invalid keystore format: scrypt n = 262144 is too large for r = 1 \
             (log2(n) must be below 16 * r)"
        );
    }

    #[test]
    fn test_scrypt_memory_is_bounded() {
        let err = decrypt_error(&scrypt_vector_with(1_099_511_627_776, 8, 1));
        assert!(matches!(err, Error::InvalidKeystoreFormat(_)));
        assert!(err.to_string().contains("memory"));

        // 128 * 8 * 2^21 = 2^31 bytes
        let err = decrypt_error(&scrypt_vector_with(1 << 21, 8, 1));
        assert!(err.to_string().contains("memory"));
    }

    #[test]
    fn test_scrypt_parallelism_is_bounded() {
        let err = decrypt_error(&scrypt_vector_with(4096, 8, 17));
        assert!(err.to_string().contains("scrypt p"));

        let err = decrypt_error(&scrypt_vector_with(4096, 8, 0));
        assert!(err.to_string().contains("scrypt p"));
    }

    #[test]
    fn test_dklen_is_bounded() {
        let huge = PBKDF2_VECTOR.replace("\"dklen\": 32", "\"dklen\": 1099511627776");
        let err = decrypt_error(&huge);
        assert!(matches!(err, Error::InvalidKeystoreFormat(_)));
        assert!(err.to_string().contains("dklen"));

        let short = SCRYPT_VECTOR.replace("\"dklen\": 32", "\"dklen\": 16");
        assert!(decrypt_error(&short).to_string().contains("dklen"));
    }

    #[test]
    fn test_pbkdf2_rounds_are_bounded() {
        let slow = PBKDF2_VECTOR.replace("\"c\": 262144", "\"c\": 4000000000");
        let err = decrypt_error(&slow);
        assert!(matches!(err, Error::InvalidKeystoreFormat(_)));
        assert!(err.to_string().contains("pbkdf2 c"));

        let zero = PBKDF2_VECTOR.replace("\"c\": 262144", "\"c\": 0");
        assert!(decrypt_error(&zero).to_string().contains("pbkdf2 c"));
    }

    #[test]
    fn test_truncated_mac_fails_closed() {
        let json = SCRYPT_VECTOR.replace(
            "193d279b2f5049ccaa85fdd7de84187adfd5f02a98edee4d62ba7905f8099833",
            "193d279b2f5049ccaa85fdd7de84187a",
        );
        assert!(matches!(decrypt_error(&json), Error::DecryptionFailed(_)));
    }

    #[test]
    fn test_wrong_password_fails_closed() {
        let keystore = KeystoreFile::from_json(PBKDF2_VECTOR).unwrap();
        let err = keystore.decrypt(&password("hunter3")).unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed(_)));
    }

    #[test]
    fn test_round_trip_reproduces_credential() {
        let credential = test_credential();
        let keystore = encrypt_credential(&credential, &password("hunter2")).unwrap();

        let json = keystore.to_json_pretty().unwrap();
        let reloaded = KeystoreFile::from_json(&json).unwrap();
        assert_eq!(reloaded, keystore);

        let decrypted = reloaded.decrypt(&password("hunter2")).unwrap();
        assert_eq!(decrypted.address(), credential.address());
        assert_eq!(*decrypted.secret_bytes(), *credential.secret_bytes());

        let err = reloaded.decrypt(&password("hunter3")).unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed(_)));
    }

    #[test]
    fn test_stored_address_matches_derived() {
        let credential = test_credential();
        let keystore = encrypt_credential(&credential, &password("hunter2")).unwrap();

        assert_eq!(
            keystore.address.as_deref(),
            Some("f39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
        let decrypted = keystore.decrypt(&password("hunter2")).unwrap();
        assert_eq!(
            hex::encode(decrypted.address()),
            keystore.address.clone().unwrap()
        );
    }

    #[test]
    fn test_address_mismatch_is_rejected() {
        let mut keystore = encrypt_credential(&test_credential(), &password("hunter2")).unwrap();
        keystore.address = Some("0000000000000000000000000000000000000001".to_string());

        let err = keystore.decrypt(&password("hunter2")).unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed(_)));
    }

    #[test]
    fn test_fresh_salt_and_iv_per_encryption() {
        let credential = test_credential();
        let first = encrypt_credential(&credential, &password("hunter2")).unwrap();
        let second = encrypt_credential(&credential, &password("hunter2")).unwrap();

        assert_ne!(first.crypto.ciphertext, second.crypto.ciphertext);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_not_json_is_invalid_format() {
        let err = KeystoreFile::from_json("not a keystore").unwrap_err();
        assert!(matches!(err, Error::InvalidKeystoreFormat(_)));
    }

    #[test]
    fn test_missing_fields_are_invalid_format() {
        let err = KeystoreFile::from_json(r#"{"version": 3, "crypto": {"cipher": "aes-128-ctr"}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKeystoreFormat(_)));
    }

    #[test]
    fn test_unsupported_version_is_invalid_format() {
        let json = PBKDF2_VECTOR.replace("\"version\": 3", "\"version\": 1");
        let err = KeystoreFile::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_kdf_name_must_match_params() {
        let json = PBKDF2_VECTOR.replace("\"kdf\": \"pbkdf2\"", "\"kdf\": \"scrypt\"");
        let err = KeystoreFile::from_json(&json).unwrap_err();
        assert!(matches!(err, Error::InvalidKeystoreFormat(_)));
    }

    #[test]
    fn test_capitalized_crypto_key_is_accepted() {
        let json = SCRYPT_VECTOR.replace("\"crypto\"", "\"Crypto\"");
        assert!(KeystoreFile::from_json(&json).is_ok());
    }

    #[test]
    fn test_load_credential_from_file() {
        let credential = test_credential();
        let keystore = encrypt_credential(&credential, &password("hunter2")).unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), keystore.to_json_pretty().unwrap()).unwrap();

        let loaded = load_credential(file.path(), &password("hunter2")).unwrap();
        assert_eq!(loaded.address(), credential.address());

        let err = load_credential(file.path(), &password("wrong")).unwrap_err();
        assert!(matches!(err, Error::DecryptionFailed(_)));
    }

    #[test]
    fn test_load_credential_missing_file() {
        let err = load_credential(Path::new("/nonexistent/key.json"), &password("x")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
