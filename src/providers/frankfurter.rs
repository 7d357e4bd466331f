use crate::core::currency::CurrencyRateProvider;
use crate::core::error::{LedgerError, Result};
use crate::providers::util::with_retry;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.frankfurter.app";

/// Exchange-rate source backed by the Frankfurter API
/// (`GET /latest?from=EUR&to=USD`).
pub struct FrankfurterProvider {
    base_url: String,
    retries: usize,
    retry_delay: Duration,
}

impl FrankfurterProvider {
    pub fn new(base_url: &str) -> Self {
        FrankfurterProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            retries: 2,
            retry_delay: Duration::from_millis(200),
        }
    }

    /// Transport-level retries applied inside a single lookup.
    pub fn with_retries(mut self, retries: usize, retry_delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = retry_delay;
        self
    }
}

#[derive(Debug, Deserialize)]
struct FrankfurterResponse {
    rates: HashMap<String, serde_json::Value>,
}

/// Parses a JSON number without passing through binary floating point.
fn parse_rate(value: &serde_json::Value) -> Option<Decimal> {
    let serde_json::Value::Number(number) = value else {
        return None;
    };
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[async_trait]
impl CurrencyRateProvider for FrankfurterProvider {
    async fn get_rate(&self, from: &str, to: &str) -> Result<Decimal> {
        let url = format!("{}/latest?from={}&to={}", self.base_url, from, to);
        debug!("Requesting currency rate from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("finledger/0.1")
            .build()
            .map_err(|e| LedgerError::rate_unavailable(from, to, format!("client error: {e}")))?;

        let response = with_retry(
            || async { client.get(&url).send().await },
            self.retries,
            self.retry_delay,
        )
        .await
        .map_err(|e| {
            warn!("Rate request to {} failed: {}", url, e);
            LedgerError::rate_unavailable(from, to, format!("request error: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(LedgerError::rate_unavailable(
                from,
                to,
                format!("HTTP error: {}", response.status()),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| LedgerError::rate_unavailable(from, to, format!("body error: {e}")))?;

        let data: FrankfurterResponse = serde_json::from_str(&text).map_err(|e| {
            LedgerError::rate_unavailable(from, to, format!("failed to parse response: {e}"))
        })?;

        let value = data
            .rates
            .get(to)
            .ok_or_else(|| LedgerError::rate_unavailable(from, to, "rate missing from response"))?;

        match parse_rate(value) {
            Some(rate) if rate > Decimal::ZERO => Ok(rate),
            _ => Err(LedgerError::rate_unavailable(
                from,
                to,
                format!("invalid rate value: {value}"),
            )),
        }
    }
}
