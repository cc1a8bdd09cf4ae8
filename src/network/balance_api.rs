//! Retrying balance lookup against a REST balance API
//!
//! Unlike [`super::NetworkClient`], this lookup never fails: after
//! `max_attempts` transport failures, or when the response does not have the
//! expected shape, it returns `None`. Callers must read `None` as "balance
//! could not be determined", never as zero.

use crate::Result;
use alloy::primitives::U256;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Fetches the raw balance document for an address
#[async_trait]
pub trait BalanceTransport: Send + Sync {
    /// Describe the request for logs
    fn describe(&self, address: &str) -> String;

    /// Return the response body, or an error if the request itself failed
    async fn fetch(&self, address: &str) -> Result<String>;
}

/// `GET {api_url}/accounts/{address}/committed` over HTTP
pub struct HttpBalanceTransport {
    client: reqwest::Client,
    api_url: String,
}

impl HttpBalanceTransport {
    pub fn new(api_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BalanceTransport for HttpBalanceTransport {
    fn describe(&self, address: &str) -> String {
        format!("{}/accounts/{}/committed", self.api_url, address)
    }

    async fn fetch(&self, address: &str) -> Result<String> {
        let response = self.client.get(self.describe(address)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(%status, body_len = body.len(), "Balance API response");
        Ok(body)
    }
}

/// Balance lookup with a bounded number of attempts
pub struct RetryingBalanceLookup<T> {
    transport: T,
    symbol: String,
    max_attempts: u32,
}

impl<T: BalanceTransport> RetryingBalanceLookup<T> {
    /// Look up `symbol` balances through `transport`, trying at most `max_attempts` times
    pub fn new(transport: T, symbol: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            transport,
            symbol: symbol.into(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Current balance in the smallest unit, or `None` if it could not be determined
    pub async fn balance_wei(&self, address: &str) -> Option<U256> {
        let mut body = None;

        for attempt in 1..=self.max_attempts {
            match self.transport.fetch(address).await {
                Ok(response) => {
                    body = Some(response);
                    break;
                }
                Err(e) => {
                    let retrying = attempt < self.max_attempts;
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "Error retrieving balance {}, {}.",
                        address,
                        if retrying {
                            "retrying"
                        } else {
                            "this was the final try"
                        }
                    );
                    tracing::debug!(uri = %self.transport.describe(address), error = %e);
                }
            }
        }

        let body = body?;
        let balance = parse_balance(&body, &self.symbol);
        if balance.is_none() {
            tracing::debug!(
                uri = %self.transport.describe(address),
                body = %body,
                "Unable to retrieve balance from the API response"
            );
        }
        balance
    }
}

/// Extract `result.balances.<symbol>` as an integer (decimal string or number)
///
/// Balances should be sent as strings. A JSON number above `u64::MAX` has
/// already been rounded to a float by the parser, so it is reported as
/// unknown rather than as an approximate amount.
fn parse_balance(body: &str, symbol: &str) -> Option<U256> {
    let document: Value = serde_json::from_str(body).ok()?;
    let raw = document.get("result")?.get("balances")?.get(symbol)?;

    match raw {
        Value::String(s) => U256::from_str_radix(s, 10).ok(),
        Value::Number(n) if n.is_f64() => {
            tracing::debug!(balance = %n, "Balance is not an exact integer");
            None
        }
        Value::Number(n) => U256::from_str_radix(&n.to_string(), 10).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then answers with `body`
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
        body: String,
    }

    impl FlakyTransport {
        fn new(failures: u32, body: &str) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                body: body.to_string(),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BalanceTransport for &FlakyTransport {
        fn describe(&self, address: &str) -> String {
            format!("mock://accounts/{}", address)
        }

        async fn fetch(&self, _address: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(Error::Network(format!("connection reset (call {})", call)));
            }
            Ok(self.body.clone())
        }
    }

    const ADDRESS: &str = "0xb929ac45b74e182b287d9ce1142e5bda76d1a3d0";
    const BODY: &str = r#"{"result": {"balances": {"GLM": "2500000000000000000"}}}"#;

    #[tokio::test]
    async fn test_succeeds_after_two_failures() {
        let transport = FlakyTransport::new(2, BODY);
        let lookup = RetryingBalanceLookup::new(&transport, "GLM", 3);

        let balance = lookup.balance_wei(ADDRESS).await;
        assert_eq!(balance, Some(U256::from(2_500_000_000_000_000_000u128)));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_three_failures_return_unknown() {
        let transport = FlakyTransport::new(3, BODY);
        let lookup = RetryingBalanceLookup::new(&transport, "GLM", 3);

        assert_eq!(lookup.balance_wei(ADDRESS).await, None);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_unexpected_shape_returns_unknown_without_retry() {
        let transport = FlakyTransport::new(0, r#"{"result": null}"#);
        let lookup = RetryingBalanceLookup::new(&transport, "GLM", 3);

        assert_eq!(lookup.balance_wei(ADDRESS).await, None);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_json_returns_unknown() {
        let transport = FlakyTransport::new(0, "<html>502 Bad Gateway</html>");
        let lookup = RetryingBalanceLookup::new(&transport, "GLM", 3);

        assert_eq!(lookup.balance_wei(ADDRESS).await, None);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let transport = FlakyTransport::new(0, BODY);
        let lookup = RetryingBalanceLookup::new(&transport, "GLM", 0);

        assert!(lookup.balance_wei(ADDRESS).await.is_some());
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_parse_balance_variants() {
        assert_eq!(
            parse_balance(r#"{"result": {"balances": {"GLM": 42}}}"#, "GLM"),
            Some(U256::from(42u64))
        );
        assert_eq!(
            parse_balance(
                r#"{"result": {"balances": {"GLM": 18446744073709551615}}}"#,
                "GLM"
            ),
            Some(U256::from(u64::MAX))
        );
        assert_eq!(parse_balance(BODY, "ETH"), None);
        assert_eq!(
            parse_balance(r#"{"result": {"balances": {"GLM": "-1"}}}"#, "GLM"),
            None
        );
    }

    #[test]
    fn test_numeric_balance_above_u64_is_unknown() {
        // 2500 GLM in wei as a bare JSON number
        let body = r#"{"result": {"balances": {"GLM": 2500000000000000000000}}}"#;
        assert_eq!(parse_balance(body, "GLM"), None);
        assert_eq!(parse_balance(r#"{"result": {"balances": {"GLM": 1.5}}}"#, "GLM"), None);

        let body = r#"{"result": {"balances": {"GLM": "2500000000000000000000"}}}"#;
        assert_eq!(
            parse_balance(body, "GLM"),
            Some(U256::from(2_500_000_000_000_000_000_000u128))
        );
    }

    #[test]
    fn test_http_transport_uri() {
        let transport =
            HttpBalanceTransport::new("https://api.example.org/api/v0.1/", Duration::from_secs(10))
                .unwrap();
        assert_eq!(
            transport.describe(ADDRESS),
            format!("https://api.example.org/api/v0.1/accounts/{}/committed", ADDRESS)
        );
    }
}
