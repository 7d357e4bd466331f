pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

pub use crate::core::config;

use crate::core::config::AppConfig;
use crate::core::models::{
    BudgetLimit, Goal, MonetaryEntry, NewGoal, NewTransaction, NotificationEvent, OwnerId,
};
use crate::core::normalizer::CurrencyNormalizer;
use crate::core::{Currency, LedgerService, LedgerStores};
use crate::providers::{FrankfurterProvider, RateLookupClient};
use crate::store::{DiskStore, open_keyspace};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Operations exposed on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Convert { amount: Decimal, currency: String },
    Add(NewTransaction),
    BudgetSet { category: String, limit: Decimal },
    BudgetRemove { category: String },
    BudgetList,
    GoalAdd(NewGoal),
    GoalDone { id: Uuid },
    GoalList,
    Trends { all: bool },
    Recur { as_of: Option<DateTime<Utc>> },
    Notifications { mark_read: Option<Uuid> },
}

/// Wires the rate source, cache, normalizer and on-disk stores from config.
pub fn build_ledger(config: &AppConfig) -> Result<LedgerService> {
    let accounting = Currency::from_code(&config.currency)
        .with_context(|| format!("Invalid accounting currency '{}'", config.currency))?;

    let source = FrankfurterProvider::new(config.providers.frankfurter_base_url())
        .with_retries(config.rates.retries, config.rates.retry_delay());
    let rates = RateLookupClient::new(Arc::new(source))
        .ttl(config.rates.ttl())
        .timeout(config.rates.timeout());
    let normalizer = CurrencyNormalizer::new(Arc::new(rates), accounting);

    let data_path = config.default_data_path()?;
    let keyspace = open_keyspace(&data_path)
        .with_context(|| format!("Failed to open ledger store at {}", data_path.display()))?;
    debug!("Opened ledger store at {}", data_path.display());
    let stores = LedgerStores {
        transactions: Arc::new(DiskStore::<MonetaryEntry>::open(&keyspace)?),
        budgets: Arc::new(DiskStore::<BudgetLimit>::open(&keyspace)?),
        goals: Arc::new(DiskStore::<Goal>::open(&keyspace)?),
        notifications: Arc::new(DiskStore::<NotificationEvent>::open(&keyspace)?),
    };

    Ok(LedgerService::new(normalizer, stores)
        .with_cooldown(config.notifications.cooldown())
        .with_budget_window(config.budgets.window)
        .with_anomaly_rule(config.anomaly.rule()))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("finledger starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let ledger = build_ledger(&config)?;
    let owner = OwnerId::new(config.owner.as_str());

    match command {
        AppCommand::Convert { amount, currency } => {
            cli::transactions::convert(&ledger, amount, &currency).await
        }
        AppCommand::Add(request) => cli::transactions::add(&ledger, &owner, request).await,
        AppCommand::BudgetSet { category, limit } => {
            cli::budgets::set(&ledger, &owner, &category, limit).await
        }
        AppCommand::BudgetRemove { category } => {
            cli::budgets::remove(&ledger, &owner, &category).await
        }
        AppCommand::BudgetList => cli::budgets::list(&ledger, &owner).await,
        AppCommand::GoalAdd(request) => cli::goals::add(&ledger, &owner, request).await,
        AppCommand::GoalDone { id } => cli::goals::done(&ledger, &owner, id).await,
        AppCommand::GoalList => cli::goals::list(&ledger, &owner).await,
        AppCommand::Trends { all } => cli::budgets::trends(&ledger, &owner, all).await,
        AppCommand::Recur { as_of } => {
            cli::transactions::recur(&ledger, &owner, as_of.unwrap_or_else(Utc::now)).await
        }
        AppCommand::Notifications { mark_read } => {
            cli::notifications::run(&ledger, &owner, mark_read).await
        }
    }
}
