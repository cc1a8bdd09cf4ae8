//! Key management
//!
//! Keystore decryption/encryption, the in-memory signing credential, and the
//! password sources that unlock them. Decrypted key material never leaves
//! this module except as signatures or a freshly encrypted keystore.

pub mod keystore;
pub mod password;
mod signer;

pub use keystore::{encrypt_credential, load_credential, KeystoreFile};
pub use password::{
    read_new_password, resolve_password, FixedPasswordProvider, PasswordProvider,
    PromptPasswordProvider,
};
pub use signer::Credential;
