//! Spending trends and budget evaluation.
//!
//! All totals are `Decimal` sums keyed in a `BTreeMap`, so equal input
//! multisets give identical totals whatever order the entries arrive in.
//! Sums saturate at `Decimal::MAX` instead of overflowing.

use super::models::{BudgetLimit, MonetaryEntry};
use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Category name -> accumulated expense total in the accounting currency.
pub type SpendingTrend = BTreeMap<String, Decimal>;

/// Half-open time window `[start, end)`; `None` leaves that side unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateWindow {
    pub fn all() -> Self {
        Self::default()
    }

    /// Calendar month (UTC) containing `at`.
    pub fn month_of(at: DateTime<Utc>) -> Self {
        let start = Utc
            .with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
            .single();
        let end = start.and_then(|s| s.checked_add_months(Months::new(1)));
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at < end)
    }
}

/// Period budgets are measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetWindow {
    /// Calendar month of the evaluated moment.
    #[default]
    Month,
    All,
}

impl BudgetWindow {
    pub fn window_for(&self, at: DateTime<Utc>) -> DateWindow {
        match self {
            BudgetWindow::Month => DateWindow::month_of(at),
            BudgetWindow::All => DateWindow::all(),
        }
    }

    /// Label of the period containing `at`: `2024-02` by month, `all` otherwise.
    pub fn period_label(&self, at: DateTime<Utc>) -> String {
        match self {
            BudgetWindow::Month => at.format("%Y-%m").to_string(),
            BudgetWindow::All => "all".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetBreach {
    pub category: String,
    pub total: Decimal,
    pub limit: Decimal,
}

/// Where a category stands against its limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub category: String,
    pub limit: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub breached: bool,
}

/// Sums the normalized amounts of expense entries per category.
pub fn compute_trends<'a>(entries: impl IntoIterator<Item = &'a MonetaryEntry>) -> SpendingTrend {
    let mut trends = SpendingTrend::new();
    for entry in entries.into_iter().filter(|e| e.is_expense()) {
        let total = trends.entry(entry.category.clone()).or_default();
        *total = total.saturating_add(entry.normalized_amount);
    }
    trends
}

/// [`compute_trends`] restricted to entries whose timestamp falls in `window`.
pub fn compute_trends_in<'a>(
    entries: impl IntoIterator<Item = &'a MonetaryEntry>,
    window: &DateWindow,
) -> SpendingTrend {
    compute_trends(entries.into_iter().filter(|e| window.contains(e.timestamp)))
}

/// Indexes budget limits by category.
pub fn limits_by_category(limits: &[BudgetLimit]) -> BTreeMap<String, Decimal> {
    limits
        .iter()
        .map(|b| (b.category.clone(), b.limit))
        .collect()
}

/// Every category present in both maps whose total is strictly above its
/// limit, ordered by category.
pub fn check_budgets(
    trends: &SpendingTrend,
    limits: &BTreeMap<String, Decimal>,
) -> Vec<BudgetBreach> {
    trends
        .iter()
        .filter_map(|(category, total)| {
            let limit = limits.get(category)?;
            (total > limit).then(|| {
                debug!(%category, %total, %limit, "Budget breached");
                BudgetBreach {
                    category: category.clone(),
                    total: *total,
                    limit: *limit,
                }
            })
        })
        .collect()
}

/// Status of every configured limit, including untouched categories.
pub fn budget_status(
    trends: &SpendingTrend,
    limits: &BTreeMap<String, Decimal>,
) -> Vec<BudgetStatus> {
    limits
        .iter()
        .map(|(category, limit)| {
            let spent = trends.get(category).copied().unwrap_or(Decimal::ZERO);
            BudgetStatus {
                category: category.clone(),
                limit: *limit,
                spent,
                remaining: *limit - spent,
                breached: spent > *limit,
            }
        })
        .collect()
}

/// Threshold for flagging a single expense as unusual for its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyRule {
    /// Multiple of the category average an expense must exceed.
    pub factor: Decimal,
    /// Prior expenses required before the average is trusted.
    pub min_history: usize,
}

impl Default for AnomalyRule {
    fn default() -> Self {
        Self {
            factor: Decimal::from(3),
            min_history: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendingAnomaly {
    pub category: String,
    pub amount: Decimal,
    pub average: Decimal,
}

/// Flags `entry` when it exceeds `rule.factor` times the average of the
/// earlier expenses in its category.
pub fn detect_anomaly<'a>(
    entry: &MonetaryEntry,
    history: impl IntoIterator<Item = &'a MonetaryEntry>,
    rule: &AnomalyRule,
) -> Option<SpendingAnomaly> {
    if !entry.is_expense() {
        return None;
    }

    let prior: Vec<Decimal> = history
        .into_iter()
        .filter(|e| {
            e.is_expense()
                && e.id != entry.id
                && e.category == entry.category
                && e.timestamp <= entry.timestamp
        })
        .map(|e| e.normalized_amount)
        .collect();
    if prior.is_empty() || prior.len() < rule.min_history {
        return None;
    }

    let sum = prior
        .iter()
        .fold(Decimal::ZERO, |acc, amount| acc.saturating_add(*amount));
    let average = sum / Decimal::from(prior.len());
    let threshold = average.checked_mul(rule.factor)?;
    (entry.normalized_amount > threshold).then(|| SpendingAnomaly {
        category: entry.category.clone(),
        amount: entry.normalized_amount,
        average: average.round_dp(2),
    })
}
