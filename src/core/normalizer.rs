//! Conversion of submitted amounts into the accounting currency.

use super::currency::{Currency, CurrencyRateProvider};
use super::error::{Result, ValidationError};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::debug;

pub struct CurrencyNormalizer {
    rates: Arc<dyn CurrencyRateProvider>,
    accounting: Currency,
}

impl CurrencyNormalizer {
    pub fn new(rates: Arc<dyn CurrencyRateProvider>, accounting: Currency) -> Self {
        Self { rates, accounting }
    }

    pub fn accounting_currency(&self) -> Currency {
        self.accounting
    }

    /// Converts `amount` from `currency` into the accounting currency.
    ///
    /// Amounts already in the accounting currency come back untouched.
    /// Converted amounts are rounded half-to-even to the accounting
    /// currency's minor units. Rate failures are returned as is, without
    /// retrying.
    pub async fn normalize(&self, amount: Decimal, currency: &str) -> Result<Decimal> {
        let source = Currency::from_code(currency)?;
        if source == self.accounting {
            return Ok(amount);
        }

        let rate = self
            .rates
            .get_rate(source.code(), self.accounting.code())
            .await?;
        let converted = amount
            .checked_mul(rate)
            .ok_or_else(|| ValidationError::AmountOutOfRange(amount.to_string()))?
            .round_dp_with_strategy(
                self.accounting.minor_units(),
                RoundingStrategy::MidpointNearestEven,
            );
        debug!(
            "Converted {amount} {source} to {converted} {} at rate {rate}",
            self.accounting
        );
        Ok(converted)
    }
}
