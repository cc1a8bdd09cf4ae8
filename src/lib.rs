//! Ethereum Sandbox Wallet
//!
//! A small toolkit for a single Ethereum account:
//! - Check native and ERC-20 balances
//! - Send native currency and ERC-20 token transfers
//! - Decrypt and re-encrypt Web3 Secret Storage keystore files
//!
//! # Security Model
//!
//! - Private keys are only ever decrypted in memory, inside the wallet module
//! - Passwords come from an injected provider, so nothing here prompts on its own
//! - Every invocation is independent: no caches, no persisted nonces

pub mod client;
pub mod config;
pub mod erc20;
pub mod network;
pub mod transaction;
pub mod units;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use client::{NativeAccount, SigningClient, TokenAccount};
pub use config::{Config, NetworkConfig, RpcSettings};
pub use erc20::TokenClient;
pub use error::{Error, Result};
pub use network::NetworkClient;
pub use transaction::{SignedTransaction, TransactionRequest, TransferBuilder};
pub use wallet::Credential;
