//! ERC-20 token client
//!
//! Reads balances through `eth_call` and sends `transfer(address,uint256)`
//! transactions signed by a [`Credential`].
//!
//! Balances are always scaled by 18 decimals ([`units::TOKEN_DECIMALS`]),
//! whatever the contract's own `decimals()` says.

use crate::network::NetworkClient;
use crate::transaction::{self, parse_address, TransactionRequest};
use crate::units;
use crate::wallet::Credential;
use crate::{Error, Result};
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest as RpcTransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;

/// ERC-20 ABI bundled with the crate
pub const DEFAULT_ERC20_ABI: &str = include_str!("../abi/erc20.json");

/// Gas assumed for one token transfer when estimating its cost
pub const TOKEN_TRANSFER_GAS_ESTIMATE: u64 = 47_563;

const BALANCE_OF_SIGNATURE: &str = "balanceOf(address)";
const TRANSFER_SIGNATURE: &str = "transfer(address,uint256)";

sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Client bound to one deployed token contract
#[derive(Clone)]
pub struct TokenClient<'a> {
    network: &'a NetworkClient,
    contract: Address,
    gas_price: Option<U256>,
    chain_id: Option<u64>,
}

impl<'a> TokenClient<'a> {
    /// Bind to the token at `contract_address`
    ///
    /// `abi` must declare `balanceOf(address)` and `transfer(address,uint256)`.
    pub fn load(network: &'a NetworkClient, contract_address: &str, abi: &str) -> Result<Self> {
        let contract = parse_address(contract_address).map_err(|_| {
            Error::InvalidContract(format!("Malformed address '{}'", contract_address))
        })?;

        let abi: JsonAbi = serde_json::from_str(abi).map_err(|e| {
            Error::InvalidContract(format!("Unreadable ABI for {}: {}", contract, e))
        })?;

        for required in [BALANCE_OF_SIGNATURE, TRANSFER_SIGNATURE] {
            if !abi.functions().any(|f| f.signature() == required) {
                return Err(Error::InvalidContract(format!(
                    "ABI for {} does not declare {}",
                    contract, required
                )));
            }
        }

        Ok(Self {
            network,
            contract,
            gas_price: None,
            chain_id: None,
        })
    }

    /// Fixed gas price (wei) instead of the node's suggestion
    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    /// Chain id to sign with instead of the node's reported one
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Contract address
    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Raw token balance of `owner` in the smallest unit
    pub async fn balance_of_raw(&self, owner: Address) -> Result<U256> {
        let calldata = IERC20::balanceOfCall { account: owner }.abi_encode();
        let tx = RpcTransactionRequest::default()
            .to(self.contract)
            .input(Bytes::from(calldata).into());

        let result = self.network.call(tx).await?;
        if result.len() < 32 {
            return Err(Error::InvalidContract(format!(
                "{} returned {} bytes for balanceOf (not a token contract?)",
                self.contract,
                result.len()
            )));
        }

        Ok(U256::from_be_slice(&result[..32]))
    }

    /// Token balance of `owner` as a decimal string (18 decimals)
    pub async fn balance_of(&self, owner: Address) -> Result<String> {
        let raw = self.balance_of_raw(owner).await?;
        Ok(units::format_units(raw, units::TOKEN_DECIMALS))
    }

    async fn resolve_gas_price(&self) -> Result<U256> {
        match self.gas_price {
            Some(gas_price) => Ok(gas_price),
            None => Ok(U256::from(self.network.gas_price().await?)),
        }
    }

    async fn resolve_chain_id(&self) -> Result<u64> {
        match self.chain_id {
            Some(chain_id) => Ok(chain_id),
            None => self.network.chain_id().await,
        }
    }

    /// Build a `transfer(to, amount)` call from the credential's address
    ///
    /// Queries, in order: nonce, gas price (unless fixed), chain id (unless
    /// fixed), gas estimate.
    pub async fn build_transfer(
        &self,
        credential: &Credential,
        to_address: &str,
        amount: U256,
    ) -> Result<TransactionRequest> {
        let to = parse_address(to_address)?;
        let from = credential.address();
        let input = Bytes::from(IERC20::transferCall { to, amount }.abi_encode());

        let nonce = self.network.get_transaction_count(from).await?;
        let gas_price = units::to_u128(self.resolve_gas_price().await?)?;
        let chain_id = self.resolve_chain_id().await?;

        let estimate = RpcTransactionRequest::default()
            .from(from)
            .to(self.contract)
            .nonce(nonce)
            .gas_price(gas_price)
            .input(input.clone().into());
        let gas_limit = self.network.estimate_gas(estimate).await?;

        let request = TransactionRequest {
            from,
            to: self.contract,
            value: U256::ZERO,
            gas_limit,
            gas_price,
            nonce,
            chain_id,
            input,
        };
        tracing::debug!(request = ?request, recipient = %to, %amount, "ERC-20 transfer");
        Ok(request)
    }

    /// Sign and submit a token transfer, returning the transaction hash
    pub async fn transfer(
        &self,
        credential: &Credential,
        to_address: &str,
        amount: U256,
    ) -> Result<TxHash> {
        let request = self.build_transfer(credential, to_address, amount).await?;
        let signed = transaction::sign(&request, credential)?;
        let tx_hash = signed.submit(self.network).await?;
        tracing::debug!(%tx_hash, "Transaction hash");
        Ok(tx_hash)
    }

    /// Native currency (decimal ether) needed to pay for one token transfer
    pub async fn eth_required_for_transfer(&self) -> Result<String> {
        let gas_price = self.resolve_gas_price().await?;
        let cost = U256::from(TOKEN_TRANSFER_GAS_ESTIMATE) * gas_price;
        Ok(units::wei_to_ether(cost))
    }
}
