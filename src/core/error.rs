//! Domain errors raised by the ledger engine.
//!
//! Rate lookups fail with [`LedgerError::RateUnavailable`] and bad input with
//! [`LedgerError::Validation`]. Foreign or missing records are
//! [`LedgerError::NotFound`]; any store I/O failure is [`LedgerError::Store`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Root error type for the ledger core.
///
/// `Clone`: a shared in-flight rate lookup hands one outcome to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Exchange rate unavailable for {from}->{to}: {reason}")]
    RateUnavailable {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Store operation failed: {0}")]
    Store(String),
}

impl LedgerError {
    pub fn rate_unavailable(from: &str, to: &str, reason: impl Into<String>) -> Self {
        LedgerError::RateUnavailable {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Input rejected before any normalization or persistence happens.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(String),

    #[error("amount {0} is out of range")]
    AmountOutOfRange(String),

    #[error("budget limit must not be negative, got {0}")]
    NegativeLimit(String),

    #[error("currency '{0}' is not supported")]
    UnknownCurrency(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("end date {end} must be after {start}")]
    EndBeforeStart { start: String, end: String },

    #[error("entry {0} has no recurrence rule")]
    NotRecurring(String),
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Store(format!("serialization: {err}"))
    }
}

impl From<fjall::Error> for LedgerError {
    fn from(err: fjall::Error) -> Self {
        LedgerError::Store(err.to_string())
    }
}
