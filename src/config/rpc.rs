//! RPC timing and fee defaults
//!
//! Every value has a built-in default and can be overridden from the
//! environment (or a `.env` file):
//!
//! ```bash
//! export ETH_SANDBOX_RPC_TIMEOUT_SECS=10
//! export ETH_SANDBOX_RECEIPT_TIMEOUT_SECS=120
//! export ETH_SANDBOX_POLL_INTERVAL_MS=1000
//! export ETH_SANDBOX_BALANCE_RETRIES=3
//! export ETH_SANDBOX_GAS_PRICE_GWEI=50
//! ```

use crate::units;
use alloy::primitives::U256;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable names
mod env_vars {
    pub const RPC_TIMEOUT_SECS: &str = "ETH_SANDBOX_RPC_TIMEOUT_SECS";
    pub const RECEIPT_TIMEOUT_SECS: &str = "ETH_SANDBOX_RECEIPT_TIMEOUT_SECS";
    pub const POLL_INTERVAL_MS: &str = "ETH_SANDBOX_POLL_INTERVAL_MS";
    pub const BALANCE_RETRIES: &str = "ETH_SANDBOX_BALANCE_RETRIES";
    pub const GAS_PRICE_GWEI: &str = "ETH_SANDBOX_GAS_PRICE_GWEI";
}

/// Built-in defaults
pub mod defaults {
    pub const RPC_TIMEOUT_SECS: u64 = 10;
    pub const RECEIPT_TIMEOUT_SECS: u64 = 120;
    pub const POLL_INTERVAL_MS: u64 = 1_000;
    pub const BALANCE_RETRIES: u32 = 3;
    pub const GAS_PRICE_GWEI: &str = "50";
}

/// Timeouts, retry budget and gas defaults shared by the network components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcSettings {
    /// Timeout for a single RPC or HTTP request
    pub request_timeout: Duration,
    /// How long to wait for a transaction to be mined
    pub receipt_timeout: Duration,
    /// Delay between receipt polls
    pub poll_interval: Duration,
    /// Attempts for the retrying balance lookup
    pub balance_retries: u32,
    /// Gas price for native transfers when none is given (wei)
    pub default_gas_price: U256,
}

impl RpcSettings {
    /// Create settings from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(secs) = env_parse::<u64>(env_vars::RPC_TIMEOUT_SECS) {
            settings.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>(env_vars::RECEIPT_TIMEOUT_SECS) {
            settings.receipt_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = env_parse::<u64>(env_vars::POLL_INTERVAL_MS) {
            settings.poll_interval = Duration::from_millis(ms);
        }
        if let Some(retries) = env_parse::<u32>(env_vars::BALANCE_RETRIES) {
            settings.balance_retries = retries.max(1);
        }
        if let Ok(gwei) = std::env::var(env_vars::GAS_PRICE_GWEI) {
            match units::gwei_to_wei(&gwei) {
                Ok(wei) => settings.default_gas_price = wei,
                Err(e) => tracing::warn!(error = %e, "Ignoring {}", env_vars::GAS_PRICE_GWEI),
            }
        }

        settings
    }
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(defaults::RPC_TIMEOUT_SECS),
            receipt_timeout: Duration::from_secs(defaults::RECEIPT_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
            balance_retries: defaults::BALANCE_RETRIES,
            // 50 gwei
            default_gas_price: U256::from(50_000_000_000u64),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => {
            tracing::debug!("Using {} from environment", name);
            Some(value)
        }
        Err(_) => {
            tracing::warn!(value = %raw, "Ignoring unparseable {}", name);
            None
        }
    }
}
