//! Ledger engine: normalization, recurrence, aggregation and notifications.

pub mod cache;
pub mod config;
pub mod currency;
pub mod error;
pub mod ledger;
pub mod log;
pub mod models;
pub mod normalizer;
pub mod notify;
pub mod recurrence;
pub mod spending;
pub mod store;

pub use currency::{Currency, CurrencyRateProvider};
pub use error::{LedgerError, Result, ValidationError};
pub use ledger::{LedgerService, LedgerStores};
pub use notify::{Dispatch, NotificationDispatcher};
