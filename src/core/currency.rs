//! Currency codes and rate conversion abstractions

use super::error::{Result, ValidationError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt::Display;

/// ISO-4217 codes this ledger accepts, with their minor-unit precision.
const CURRENCIES: &[(&str, u32)] = &[
    ("AUD", 2),
    ("BGN", 2),
    ("BHD", 3),
    ("BRL", 2),
    ("CAD", 2),
    ("CHF", 2),
    ("CLP", 0),
    ("CNY", 2),
    ("CZK", 2),
    ("DKK", 2),
    ("EUR", 2),
    ("GBP", 2),
    ("HKD", 2),
    ("HUF", 2),
    ("IDR", 2),
    ("ILS", 2),
    ("INR", 2),
    ("ISK", 0),
    ("JOD", 3),
    ("JPY", 0),
    ("KRW", 0),
    ("KWD", 3),
    ("MXN", 2),
    ("MYR", 2),
    ("NOK", 2),
    ("NZD", 2),
    ("OMR", 3),
    ("PHP", 2),
    ("PLN", 2),
    ("RON", 2),
    ("SEK", 2),
    ("SGD", 2),
    ("THB", 2),
    ("TND", 3),
    ("TRY", 2),
    ("USD", 2),
    ("VND", 0),
    ("ZAR", 2),
];

/// A validated currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Currency {
    code: &'static str,
    minor_units: u32,
}

impl Currency {
    /// Looks up a code, ignoring case and surrounding whitespace.
    pub fn from_code(code: &str) -> Result<Self> {
        let wanted = code.trim().to_ascii_uppercase();
        CURRENCIES
            .iter()
            .find(|(c, _)| *c == wanted)
            .map(|&(code, minor_units)| Currency { code, minor_units })
            .ok_or_else(|| ValidationError::UnknownCurrency(code.to_string()).into())
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Number of decimal places amounts in this currency are rounded to.
    pub fn minor_units(&self) -> u32 {
        self.minor_units
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code)
    }
}

/// Source of conversion rates between two currency codes.
///
/// `get_rate(from, to)` returns how many units of `to` one unit of `from` buys.
#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn get_rate(&self, from: &str, to: &str) -> Result<Decimal>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LedgerError;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let eur = Currency::from_code(" eur ").unwrap();
        assert_eq!(eur.code(), "EUR");
        assert_eq!(eur.minor_units(), 2);
        assert_eq!(eur.to_string(), "EUR");
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(Currency::from_code("JPY").unwrap().minor_units(), 0);
        assert_eq!(Currency::from_code("KWD").unwrap().minor_units(), 3);
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let err = Currency::from_code("XXZ").unwrap_err();
        assert_eq!(
            err,
            LedgerError::Validation(ValidationError::UnknownCurrency("XXZ".into()))
        );
    }
}
