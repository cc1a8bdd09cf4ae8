//! Chain access
//!
//! [`NetworkClient`] talks JSON-RPC to a node; [`balance_api`] holds the
//! one lookup that retries and degrades to "unknown" instead of failing.

pub mod balance_api;
mod client;

pub use balance_api::{BalanceTransport, HttpBalanceTransport, RetryingBalanceLookup};
pub use client::NetworkClient;

#[cfg(test)]
pub(crate) use client::tests::mocked_client;
