//! Typed ledger records.
//!
//! Every record belongs to exactly one [`OwnerId`]; the engine never mixes
//! records of different owners.

use super::currency::Currency;
use super::error::{Result, ValidationError};
use chrono::{DateTime, Months, NaiveDate, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;

/// Authenticated identity resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        OwnerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expense,
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Income => write!(f, "income"),
            EntryKind::Expense => write!(f, "expense"),
        }
    }
}

impl FromStr for EntryKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(EntryKind::Income),
            "expense" => Ok(EntryKind::Expense),
            _ => Err(anyhow::anyhow!("Invalid entry kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
}

impl RecurrencePattern {
    /// Moves `from` forward by one interval.
    ///
    /// Months are calendar months: a day-of-month that does not exist in the
    /// target month clamps to its last day (Jan 31 -> Feb 28/29).
    pub fn advance(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            RecurrencePattern::Daily => from.checked_add_signed(TimeDelta::days(1)),
            RecurrencePattern::Weekly => from.checked_add_signed(TimeDelta::weeks(1)),
            RecurrencePattern::Monthly => from.checked_add_months(Months::new(1)),
        }
    }
}

impl Display for RecurrencePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RecurrencePattern::Daily => "daily",
                RecurrencePattern::Weekly => "weekly",
                RecurrencePattern::Monthly => "monthly",
            }
        )
    }
}

impl FromStr for RecurrencePattern {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(RecurrencePattern::Daily),
            "weekly" => Ok(RecurrencePattern::Weekly),
            "monthly" => Ok(RecurrencePattern::Monthly),
            _ => Err(anyhow::anyhow!("Invalid recurrence pattern: {}", s)),
        }
    }
}

/// Schedule attached to a recurring [`MonetaryEntry`].
///
/// `last_materialized` only moves forward and always stays before `end_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub pattern: RecurrencePattern,
    /// Exclusive bound: no occurrence is generated on or after it.
    pub end_date: Option<DateTime<Utc>>,
    pub last_materialized: DateTime<Utc>,
}

impl RecurrenceRule {
    /// Date of the next occurrence, if the schedule still allows one.
    pub fn next_occurrence(&self) -> Option<DateTime<Utc>> {
        self.pattern
            .advance(self.last_materialized)
            .filter(|next| self.end_date.is_none_or(|end| *next < end))
    }

    /// True once no further occurrence can ever be produced.
    pub fn is_exhausted(&self) -> bool {
        self.next_occurrence().is_none()
    }
}

/// One ledger line. `normalized_amount` is always in the accounting currency,
/// `amount`/`currency` keep what the user submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonetaryEntry {
    pub id: Uuid,
    pub owner: OwnerId,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub currency: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub normalized_amount: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
    /// Recurring template this entry was materialized from.
    #[serde(default)]
    pub origin: Option<Uuid>,
}

impl MonetaryEntry {
    pub fn is_expense(&self) -> bool {
        self.kind == EntryKind::Expense
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLimit {
    pub id: Uuid,
    pub owner: OwnerId,
    pub category: String,
    pub limit: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Savings goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub owner: OwnerId,
    pub title: String,
    pub description: Option<String>,
    pub target_amount: Option<Decimal>,
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Spending,
    Recurring,
    Goal,
    Custom,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Spending => "spending",
            NotificationKind::Recurring => "recurring",
            NotificationKind::Goal => "goal",
            NotificationKind::Custom => "custom",
        }
    }
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub owner: OwnerId,
    pub kind: NotificationKind,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub dedup_key: String,
}

/// Largest amount a single request may carry (one quadrillion).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Recurrence requested alongside a new transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecurrence {
    pub pattern: RecurrencePattern,
    pub end_date: Option<DateTime<Utc>>,
}

/// Transaction as submitted by the caller, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub kind: EntryKind,
    pub amount: Decimal,
    pub currency: String,
    pub category: String,
    pub tags: Vec<String>,
    /// Defaults to the submission time.
    pub date: Option<DateTime<Utc>>,
    pub recurrence: Option<NewRecurrence>,
}

impl NewTransaction {
    /// Checks the request and returns the resolved currency.
    pub fn validate(&self) -> Result<Currency> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(self.amount.to_string()).into());
        }
        if self.amount > MAX_AMOUNT {
            return Err(ValidationError::AmountOutOfRange(self.amount.to_string()).into());
        }
        if self.category.trim().is_empty() {
            return Err(ValidationError::MissingField("category").into());
        }
        let currency = Currency::from_code(&self.currency)?;

        if let (Some(start), Some(NewRecurrence {
            end_date: Some(end),
            ..
        })) = (self.date, &self.recurrence)
        {
            if *end <= start {
                return Err(ValidationError::EndBeforeStart {
                    start: start.to_rfc3339(),
                    end: end.to_rfc3339(),
                }
                .into());
            }
        }
        Ok(currency)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewGoal {
    pub title: String,
    pub description: Option<String>,
    pub target_amount: Option<Decimal>,
    pub target_date: Option<NaiveDate>,
}

impl NewGoal {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title").into());
        }
        if let Some(target) = self.target_amount {
            if target <= Decimal::ZERO {
                return Err(ValidationError::NonPositiveAmount(target.to_string()).into());
            }
            if target > MAX_AMOUNT {
                return Err(ValidationError::AmountOutOfRange(target.to_string()).into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LedgerError;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn transaction() -> NewTransaction {
        NewTransaction {
            kind: EntryKind::Expense,
            amount: dec!(12.50),
            currency: "eur".to_string(),
            category: "Food".to_string(),
            tags: vec![],
            date: Some(utc(2024, 1, 15)),
            recurrence: None,
        }
    }

    #[test]
    fn test_monthly_advance_clamps_to_month_end() {
        let next = RecurrencePattern::Monthly.advance(utc(2023, 1, 31)).unwrap();
        assert_eq!(next, utc(2023, 2, 28));

        let next = RecurrencePattern::Monthly.advance(utc(2024, 1, 31)).unwrap();
        assert_eq!(next, utc(2024, 2, 29));
    }

    #[test]
    fn test_daily_and_weekly_advance() {
        assert_eq!(
            RecurrencePattern::Daily.advance(utc(2024, 2, 28)).unwrap(),
            utc(2024, 2, 29)
        );
        assert_eq!(
            RecurrencePattern::Weekly.advance(utc(2024, 12, 30)).unwrap(),
            utc(2025, 1, 6)
        );
    }

    #[test]
    fn test_rule_exhaustion() {
        let rule = RecurrenceRule {
            pattern: RecurrencePattern::Monthly,
            end_date: Some(utc(2024, 2, 15)),
            last_materialized: utc(2024, 1, 15),
        };
        // End date is exclusive.
        assert!(rule.is_exhausted());

        let open = RecurrenceRule {
            end_date: None,
            ..rule
        };
        assert_eq!(open.next_occurrence(), Some(utc(2024, 2, 15)));
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("Expense".parse::<EntryKind>().unwrap(), EntryKind::Expense);
        assert_eq!(
            "weekly".parse::<RecurrencePattern>().unwrap(),
            RecurrencePattern::Weekly
        );
        assert!("yearly".parse::<RecurrencePattern>().is_err());
    }

    #[test]
    fn test_transaction_validation() {
        assert_eq!(transaction().validate().unwrap().code(), "EUR");

        let mut tx = transaction();
        tx.amount = dec!(0);
        assert!(matches!(
            tx.validate(),
            Err(LedgerError::Validation(ValidationError::NonPositiveAmount(_)))
        ));

        let mut tx = transaction();
        tx.category = "  ".to_string();
        assert_eq!(
            tx.validate().unwrap_err(),
            LedgerError::Validation(ValidationError::MissingField("category"))
        );

        let mut tx = transaction();
        tx.currency = "ABC".to_string();
        assert!(matches!(
            tx.validate(),
            Err(LedgerError::Validation(ValidationError::UnknownCurrency(_)))
        ));

        let mut tx = transaction();
        tx.recurrence = Some(NewRecurrence {
            pattern: RecurrencePattern::Monthly,
            end_date: Some(utc(2024, 1, 1)),
        });
        assert!(matches!(
            tx.validate(),
            Err(LedgerError::Validation(ValidationError::EndBeforeStart { .. }))
        ));
    }

    #[test]
    fn test_amount_upper_bound() {
        let mut tx = transaction();
        tx.amount = MAX_AMOUNT;
        assert!(tx.validate().is_ok());

        tx.amount = dec!(5e28);
        assert!(matches!(
            tx.validate(),
            Err(LedgerError::Validation(ValidationError::AmountOutOfRange(_)))
        ));
    }

    #[test]
    fn test_goal_validation() {
        let goal = NewGoal {
            title: "Emergency fund".to_string(),
            target_amount: Some(dec!(5000)),
            ..Default::default()
        };
        assert!(goal.validate().is_ok());
        assert!(NewGoal::default().validate().is_err());
    }
}
