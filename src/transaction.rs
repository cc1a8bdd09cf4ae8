//! Transaction construction and signing
//!
//! Native transfers are legacy (type 0) transactions with a flat gas limit
//! of 21000 and an explicit gas price. The nonce is always fetched from the
//! node at build time; nothing is tracked locally between calls.

use crate::network::NetworkClient;
use crate::units;
use crate::wallet::Credential;
use crate::{Error, Result};
use alloy::consensus::{Signed, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use serde::Serialize;
use std::str::FromStr;

/// Gas used by a plain value transfer (no calldata)
pub const NATIVE_TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Parse and validate an account address
pub fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|e| Error::InvalidAddress(format!("'{}': {}", value, e)))
}

/// A transaction ready for signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub nonce: u64,
    pub chain_id: u64,
    pub input: Bytes,
}

impl TransactionRequest {
    fn to_legacy(&self) -> TxLegacy {
        TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            to: TxKind::Call(self.to),
            value: self.value,
            input: self.input.clone(),
        }
    }

    /// Maximum fee this transaction can cost (gas limit x gas price)
    pub fn max_fee(&self) -> U256 {
        U256::from(self.gas_limit) * U256::from(self.gas_price)
    }
}

/// A signed transaction, opaque apart from its hash and wire encoding
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    signed: Signed<TxLegacy>,
}

impl SignedTransaction {
    /// Transaction hash (keccak of the encoding)
    pub fn hash(&self) -> TxHash {
        *self.signed.hash()
    }

    /// Raw bytes for `eth_sendRawTransaction`
    pub fn encoded(&self) -> Vec<u8> {
        TxEnvelope::Legacy(self.signed.clone()).encoded_2718()
    }

    /// Submit to the network, returning the hash the node reports
    pub async fn submit(&self, network: &NetworkClient) -> Result<TxHash> {
        network.send_raw_transaction(&self.encoded()).await
    }
}

/// Sign `request` with `credential`
///
/// The credential must own the sender address.
pub fn sign(request: &TransactionRequest, credential: &Credential) -> Result<SignedTransaction> {
    if request.from != credential.address() {
        return Err(Error::Signing(format!(
            "Credential for {} cannot sign a transaction from {}",
            credential.address(),
            request.from
        )));
    }

    let signed = credential.sign_legacy(request.to_legacy())?;
    tracing::debug!(tx_hash = %signed.hash(), nonce = request.nonce, "Transaction signed");
    Ok(SignedTransaction { signed })
}

/// Builds native-currency transfers against one network
pub struct TransferBuilder<'a> {
    network: &'a NetworkClient,
    chain_id: u64,
    gas_price: U256,
}

impl<'a> TransferBuilder<'a> {
    /// Builder using the network's default gas price
    pub fn new(network: &'a NetworkClient, chain_id: u64) -> Self {
        Self {
            network,
            chain_id,
            gas_price: network.settings().default_gas_price,
        }
    }

    /// Override the gas price (wei)
    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = gas_price;
        self
    }

    /// Build a transfer of `amount_ether` (decimal ether) to `to_address`
    pub async fn build_native_transfer(
        &self,
        credential: &Credential,
        to_address: &str,
        amount_ether: &str,
    ) -> Result<TransactionRequest> {
        let to = parse_address(to_address)?;
        let value = units::ether_to_wei(amount_ether)?;
        self.build_native_transfer_wei(credential, to, value).await
    }

    /// Build a transfer of `value` wei to `to`
    pub async fn build_native_transfer_wei(
        &self,
        credential: &Credential,
        to: Address,
        value: U256,
    ) -> Result<TransactionRequest> {
        let from = credential.address();
        let nonce = self.network.get_transaction_count(from).await?;

        let request = TransactionRequest {
            from,
            to,
            value,
            gas_limit: NATIVE_TRANSFER_GAS_LIMIT,
            gas_price: units::to_u128(self.gas_price)?,
            nonce,
            chain_id: self.chain_id,
            input: Bytes::new(),
        };

        tracing::debug!(
            from = %request.from.to_checksum(None),
            to = %request.to.to_checksum(None),
            value = %request.value,
            nonce = request.nonce,
            chain_id = request.chain_id,
            "Native transfer built"
        );
        Ok(request)
    }
}
