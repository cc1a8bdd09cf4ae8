//! Signing clients
//!
//! [`SigningClient`] is the capability shared by every account that can hold
//! and send value. The variant is picked once, at construction:
//! [`NativeAccount`] moves the chain's own currency, [`TokenAccount`] moves an
//! ERC-20 token.

use crate::erc20::TokenClient;
use crate::network::NetworkClient;
use crate::transaction::{self, parse_address, TransferBuilder};
use crate::wallet::Credential;
use crate::Result;
use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;

/// An account that can report its balance and send transfers
#[async_trait]
pub trait SigningClient: Send + Sync {
    /// Address that signs and pays
    fn address(&self) -> Address;

    /// Balance in the smallest unit
    async fn balance(&self) -> Result<U256>;

    /// Send `amount` (smallest unit) to `to_address`
    async fn transfer(&self, to_address: &str, amount: U256) -> Result<TxHash>;
}

/// Native currency account
pub struct NativeAccount<'a> {
    credential: Credential,
    network: &'a NetworkClient,
    builder: TransferBuilder<'a>,
}

impl<'a> NativeAccount<'a> {
    pub fn new(credential: Credential, network: &'a NetworkClient, chain_id: u64) -> Self {
        Self {
            credential,
            network,
            builder: TransferBuilder::new(network, chain_id),
        }
    }

    /// Fixed gas price (wei) for transfers
    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.builder = self.builder.with_gas_price(gas_price);
        self
    }
}

#[async_trait]
impl SigningClient for NativeAccount<'_> {
    fn address(&self) -> Address {
        self.credential.address()
    }

    async fn balance(&self) -> Result<U256> {
        self.network.get_balance(self.credential.address()).await
    }

    async fn transfer(&self, to_address: &str, amount: U256) -> Result<TxHash> {
        let to = parse_address(to_address)?;
        let request = self
            .builder
            .build_native_transfer_wei(&self.credential, to, amount)
            .await?;
        let signed = transaction::sign(&request, &self.credential)?;
        let tx_hash = signed.submit(self.network).await?;
        tracing::info!(%tx_hash, to = %to.to_checksum(None), %amount, "Native transfer sent");
        Ok(tx_hash)
    }
}

/// ERC-20 token account
pub struct TokenAccount<'a> {
    credential: Credential,
    token: TokenClient<'a>,
}

impl<'a> TokenAccount<'a> {
    pub fn new(credential: Credential, token: TokenClient<'a>) -> Self {
        Self { credential, token }
    }

    /// Underlying token client
    pub fn token(&self) -> &TokenClient<'a> {
        &self.token
    }
}

#[async_trait]
impl SigningClient for TokenAccount<'_> {
    fn address(&self) -> Address {
        self.credential.address()
    }

    async fn balance(&self) -> Result<U256> {
        self.token.balance_of_raw(self.credential.address()).await
    }

    async fn transfer(&self, to_address: &str, amount: U256) -> Result<TxHash> {
        let tx_hash = self
            .token
            .transfer(&self.credential, to_address, amount)
            .await?;
        tracing::info!(
            %tx_hash,
            to = %to_address,
            %amount,
            contract = %self.token.contract(),
            "Token transfer sent"
        );
        Ok(tx_hash)
    }
}
