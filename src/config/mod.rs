//! Configuration for the sandbox wallet tool
//!
//! A configuration file maps network names to their endpoints:
//!
//! ```json
//! {
//!   "payment_networks": {
//!     "holesky": {
//!       "node_address": "https://rpc.ankr.com/eth_holesky",
//!       "token_contract_address": "0x8888888815bf4DB87e57B609A50f938311EEd068",
//!       "proof_of_authority": false,
//!       "chain_id": 17000
//!     }
//!   }
//! }
//! ```
//!
//! The file is read once in `main` and the selected [`NetworkConfig`] is
//! handed to every component that needs it.

pub mod rpc;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// Re-export RPC settings
pub use rpc::RpcSettings;

/// Network selected when `--network` is not given
pub const DEFAULT_NETWORK: &str = "mainnet";

/// Chain id used for native transfers when a network does not declare one
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Settings for a single Ethereum network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Name the network was selected by (filled in from the map key)
    #[serde(default, skip_serializing)]
    pub network_name: String,
    /// JSON-RPC endpoint of the node
    pub node_address: String,
    /// ERC-20 token contract used by the token commands
    #[serde(default, alias = "glm_contract_address")]
    pub token_contract_address: Option<String>,
    /// Node runs a proof-of-authority chain
    #[serde(default, alias = "geth_poa_middleware")]
    pub proof_of_authority: bool,
    /// Chain id signed into transactions
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Base URL of a REST balance API (`{url}/accounts/{address}/committed`)
    #[serde(default)]
    pub balance_api_url: Option<String>,
    /// Token symbol to read from the REST balance API response
    #[serde(default)]
    pub balance_api_symbol: Option<String>,
}

impl NetworkConfig {
    /// Minimal config for an ad-hoc endpoint (e.g. `--node-address`)
    pub fn for_endpoint(node_address: impl Into<String>) -> Self {
        Self {
            network_name: "custom".to_string(),
            node_address: node_address.into(),
            token_contract_address: None,
            proof_of_authority: false,
            chain_id: None,
            balance_api_url: None,
            balance_api_symbol: None,
        }
    }

    /// Chain id for native transfers
    pub fn chain_id_or_default(&self) -> u64 {
        self.chain_id.unwrap_or(DEFAULT_CHAIN_ID)
    }

    /// Token contract address, or a configuration error naming the network
    pub fn require_token_contract(&self) -> Result<&str> {
        self.token_contract_address.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "`token_contract_address` not set for network `{}`",
                self.network_name
            ))
        })
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network settings indexed by name
    pub payment_networks: BTreeMap<String, NetworkConfig>,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Could not load config from {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
            .map_err(|e| Error::Config(format!("{} in {}", e, path.display())))
    }

    /// Parse configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// Get the configuration for a given network
    pub fn for_network(&self, network_name: &str) -> Result<NetworkConfig> {
        let mut config = self
            .payment_networks
            .get(network_name)
            .cloned()
            .ok_or_else(|| {
                Error::Config(format!(
                    "`{}` not defined in payment_networks (known: {})",
                    network_name,
                    self.network_names().join(", ")
                ))
            })?;
        config.network_name = network_name.to_string();

        tracing::debug!(network = %network_name, config = ?config, "Payment network config");
        Ok(config)
    }

    /// Names of all configured networks
    pub fn network_names(&self) -> Vec<String> {
        self.payment_networks.keys().cloned().collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut payment_networks = BTreeMap::new();

        payment_networks.insert(
            "mainnet".to_string(),
            NetworkConfig {
                network_name: String::new(),
                node_address: "https://geth.golem.network:55555".to_string(),
                token_contract_address: Some(
                    "0x7DD9c5Cba05E151C895FDe1CF355C9A1D5DA6429".to_string(),
                ),
                proof_of_authority: false,
                chain_id: Some(1),
                balance_api_url: None,
                balance_api_symbol: None,
            },
        );
        payment_networks.insert(
            "holesky".to_string(),
            NetworkConfig {
                network_name: String::new(),
                node_address: "https://rpc.ankr.com/eth_holesky".to_string(),
                token_contract_address: None,
                proof_of_authority: false,
                chain_id: Some(17000),
                balance_api_url: None,
                balance_api_symbol: None,
            },
        );

        Self { payment_networks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_networks() {
        let config = Config::default();
        assert_eq!(config.network_names(), vec!["holesky", "mainnet"]);

        let mainnet = config.for_network("mainnet").unwrap();
        assert_eq!(mainnet.network_name, "mainnet");
        assert_eq!(mainnet.chain_id_or_default(), 1);
    }

    #[test]
    fn test_unknown_network_is_config_error() {
        let config = Config::default();
        let err = config.for_network("rinkeby").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("rinkeby"));
        assert!(err.to_string().contains("holesky"));
    }

    #[test]
    fn test_accepts_legacy_field_names() {
        let value = serde_json::json!({
            "payment_networks": {
                "polygon": {
                    "node_address": "https://polygon-rpc.com",
                    "glm_contract_address": "0x0B220b82F3eA3B7F6d9A1D8ab58930C064A2b5Bf",
                    "geth_poa_middleware": true
                }
            }
        });
        let config = Config::from_json(&value.to_string()).unwrap();
        let polygon = config.for_network("polygon").unwrap();

        assert!(polygon.proof_of_authority);
        assert_eq!(
            polygon.token_contract_address.as_deref(),
            Some("0x0B220b82F3eA3B7F6d9A1D8ab58930C064A2b5Bf")
        );
        assert_eq!(polygon.chain_id, None);
        assert_eq!(polygon.chain_id_or_default(), DEFAULT_CHAIN_ID);
    }

    #[test]
    fn test_missing_node_address_is_config_error() {
        let value = serde_json::json!({
            "payment_networks": { "broken": { "proof_of_authority": true } }
        });
        let err = Config::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("node_address"));
    }

    #[test]
    fn test_require_token_contract() {
        let config = Config::default();
        let holesky = config.for_network("holesky").unwrap();
        let err = holesky.require_token_contract().unwrap_err();
        assert!(err.to_string().contains("holesky"));

        let mainnet = config.for_network("mainnet").unwrap();
        assert!(mainnet.require_token_contract().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"{"payment_networks": {"local": {"node_address": "http://127.0.0.1:8545", "chain_id": 31337}}}"#,
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        let local = config.for_network("local").unwrap();
        assert_eq!(local.node_address, "http://127.0.0.1:8545");
        assert_eq!(local.chain_id, Some(31337));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
