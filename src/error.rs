//! Error types for the sandbox wallet tool

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid keystore format: {0}")]
    InvalidKeystoreFormat(String),

    #[error("Keystore decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Repeated password different from the original one")]
    PasswordMismatch,

    #[error("Network error: {0}")]
    Network(String),

    #[error("RPC rejected the request: {0}")]
    RpcRejected(String),

    #[error("Timed out after {timeout_secs}s waiting for receipt of {tx_hash}")]
    ReceiptTimeout { tx_hash: String, timeout_secs: u64 },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Invalid contract: {0}")]
    InvalidContract(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
