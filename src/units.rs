//! Fixed-point unit conversion
//!
//! Amounts typed by a user ("1.5" ether, "50" gwei) are converted to the
//! smallest integer unit by string manipulation, never through `f64`, so a
//! value with up to `decimals` fractional digits survives a round trip exactly.

use crate::{Error, Result};
use alloy::primitives::U256;

/// Decimals of the native currency (wei per ether = 10^18)
pub const ETHER_DECIMALS: u8 = 18;

/// Decimals between wei and gwei
pub const GWEI_DECIMALS: u8 = 9;

/// Decimals assumed for every ERC-20 token balance.
///
/// Tokens declaring a different `decimals()` are reported with the wrong
/// scale; the contract is never queried for its own value.
pub const TOKEN_DECIMALS: u8 = 18;

/// Parse a non-negative decimal string into smallest units
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    let invalid = |reason: &str| Error::InvalidAmount(format!("'{}': {}", amount, reason));

    if amount.is_empty() {
        return Err(invalid("empty amount"));
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid("expected a non-negative decimal number"));
    }
    if fraction.len() > decimals as usize {
        return Err(invalid(&format!(
            "more than {} fractional digits",
            decimals
        )));
    }

    let digits = format!(
        "{}{:0<width$}",
        whole,
        fraction,
        width = decimals as usize
    );
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(digits, 10).map_err(|e| invalid(&e.to_string()))
}

/// Format a U256 value with decimals
pub fn format_units(value: U256, decimals: u8) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10).pow(U256::from(decimals));
    let whole = value / divisor;
    let remainder = value % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let remainder_str = format!(
            "{:0>width$}",
            remainder.to_string(),
            width = decimals as usize
        );
        let trimmed = remainder_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}

/// Ether amount to wei
pub fn ether_to_wei(amount: &str) -> Result<U256> {
    parse_units(amount, ETHER_DECIMALS)
}

/// Wei amount to a human-readable ether amount
pub fn wei_to_ether(value: U256) -> String {
    format_units(value, ETHER_DECIMALS)
}

/// Gwei amount to wei
pub fn gwei_to_wei(amount: &str) -> Result<U256> {
    parse_units(amount, GWEI_DECIMALS)
}

/// Narrow a wei amount to `u128`, the width alloy uses for gas prices
pub fn to_u128(value: U256) -> Result<u128> {
    u128::try_from(value)
        .map_err(|_| Error::InvalidAmount(format!("{} does not fit in u128", value)))
}
