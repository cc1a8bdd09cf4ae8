//! JSON-RPC client with timeout and error handling
//!
//! # Responsibilities
//! - Connect to the configured node endpoint
//! - Query chain state (balances, nonces, gas price, receipts)
//! - Submit signed transactions
//!
//! No retries happen here: each operation is a single RPC call and its
//! failure goes straight back to the caller.

use crate::config::{NetworkConfig, RpcSettings};
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::TransportError;
use std::future::IntoFuture;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// How a failed call is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    /// Chain state reads: every failure is a `Network` error
    Read,
    /// Calls the node validates: its error responses become `RpcRejected`
    Submit,
}

/// RPC client bound to one node
#[derive(Clone)]
pub struct NetworkClient {
    provider: DynProvider,
    settings: RpcSettings,
}

impl NetworkClient {
    /// Create a client for the configured network
    pub fn connect(network: &NetworkConfig, settings: RpcSettings) -> Result<Self> {
        let url: url::Url = network.node_address.parse().map_err(|e| {
            Error::Config(format!(
                "Invalid node address '{}': {}",
                network.node_address, e
            ))
        })?;

        if network.proof_of_authority {
            tracing::debug!(
                network = %network.network_name,
                "Proof-of-authority network, extraData is accepted as-is"
            );
        }

        let provider = ProviderBuilder::new().connect_http(url).erased();

        tracing::debug!(
            network = %network.network_name,
            node_address = %network.node_address,
            "Network client initialized"
        );

        Ok(Self::from_provider(provider, settings))
    }

    /// Wrap an existing provider
    pub fn from_provider(provider: DynProvider, settings: RpcSettings) -> Self {
        Self { provider, settings }
    }

    /// Timing and fee defaults in use
    pub fn settings(&self) -> &RpcSettings {
        &self.settings
    }

    /// Run one RPC call under the request timeout
    async fn request<T, F>(&self, kind: CallKind, what: &str, call: F) -> Result<T>
    where
        F: IntoFuture<Output = std::result::Result<T, TransportError>>,
    {
        match timeout(self.settings.request_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify(kind, what, e)),
            Err(_) => Err(Error::Network(format!(
                "{}: no response within {}s",
                what,
                self.settings.request_timeout.as_secs()
            ))),
        }
    }

    /// Native balance in wei
    pub async fn get_balance(&self, address: Address) -> Result<U256> {
        self.request(
            CallKind::Read,
            &format!("get balance of {}", address),
            self.provider.get_balance(address),
        )
        .await
    }

    /// Next nonce for `address`
    pub async fn get_transaction_count(&self, address: Address) -> Result<u64> {
        self.request(
            CallKind::Read,
            &format!("get transaction count of {}", address),
            self.provider.get_transaction_count(address),
        )
        .await
    }

    /// Node's suggested gas price in wei
    pub async fn gas_price(&self) -> Result<u128> {
        self.request(CallKind::Read, "get gas price", self.provider.get_gas_price())
            .await
    }

    /// Chain id reported by the node
    pub async fn chain_id(&self) -> Result<u64> {
        self.request(CallKind::Read, "get chain id", self.provider.get_chain_id())
            .await
    }

    /// Read-only contract call (`eth_call`)
    pub async fn call(&self, tx: TransactionRequest) -> Result<Bytes> {
        self.request(CallKind::Submit, "eth_call", self.provider.call(tx))
            .await
    }

    /// Gas estimate for a transaction
    pub async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64> {
        self.request(CallKind::Submit, "estimate gas", self.provider.estimate_gas(tx))
            .await
    }

    /// Submit a signed, encoded transaction and return its hash
    pub async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<TxHash> {
        let pending = self
            .request(
                CallKind::Submit,
                "send raw transaction",
                self.provider.send_raw_transaction(encoded),
            )
            .await?;

        let tx_hash = *pending.tx_hash();
        tracing::debug!(%tx_hash, "Transaction submitted");
        Ok(tx_hash)
    }

    /// Poll until the transaction is mined or `max_wait` elapses
    pub async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        max_wait: Duration,
    ) -> Result<TransactionReceipt> {
        let started = Instant::now();

        loop {
            let receipt = self
                .request(
                    CallKind::Read,
                    &format!("get receipt of {}", tx_hash),
                    self.provider.get_transaction_receipt(tx_hash),
                )
                .await?;

            if let Some(receipt) = receipt {
                tracing::debug!(
                    %tx_hash,
                    block = ?receipt.block_number,
                    "Transaction mined"
                );
                return Ok(receipt);
            }

            let elapsed = started.elapsed();
            if elapsed >= max_wait {
                return Err(Error::ReceiptTimeout {
                    tx_hash: tx_hash.to_string(),
                    timeout_secs: max_wait.as_secs(),
                });
            }

            tokio::time::sleep(self.settings.poll_interval.min(max_wait - elapsed)).await;
        }
    }
}

fn classify(kind: CallKind, what: &str, error: TransportError) -> Error {
    match (kind, error.as_error_resp()) {
        (CallKind::Submit, Some(payload)) => Error::RpcRejected(payload.message.to_string()),
        _ => Error::Network(format!("{}: {}", what, error)),
    }
}
