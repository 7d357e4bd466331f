//! Expansion of recurring transactions into dated ledger entries.

use super::error::{Result, ValidationError};
use super::models::{MonetaryEntry, RecurrenceRule};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// Lazily walks the occurrences of a rule that are due by `as_of`.
///
/// Each yielded date is recorded as the rule's `last_materialized`, so
/// consuming the iterator advances the rule.
pub struct DueOccurrences<'a> {
    rule: &'a mut RecurrenceRule,
    as_of: DateTime<Utc>,
}

impl<'a> DueOccurrences<'a> {
    pub fn new(rule: &'a mut RecurrenceRule, as_of: DateTime<Utc>) -> Self {
        Self { rule, as_of }
    }
}

impl Iterator for DueOccurrences<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.rule.next_occurrence()?;
        if next > self.as_of {
            return None;
        }
        self.rule.last_materialized = next;
        Some(next)
    }
}

/// Builds the entries a recurring template owes up to `as_of` and advances
/// its rule to the last generated date.
///
/// Occurrences copy the template's kind, amounts, currency, category and
/// tags; they carry no rule of their own and point back at the template via
/// `origin`. Calling this again without `as_of` moving past the next
/// interval yields nothing.
pub fn materialize_due(
    entry: &mut MonetaryEntry,
    as_of: DateTime<Utc>,
) -> Result<Vec<MonetaryEntry>> {
    let template_id = entry.id;
    let template = MonetaryEntry {
        recurrence: None,
        origin: Some(template_id),
        ..entry.clone()
    };
    let rule = entry
        .recurrence
        .as_mut()
        .ok_or_else(|| ValidationError::NotRecurring(template_id.to_string()))?;

    if rule.is_exhausted() {
        debug!(entry = %template_id, "Recurrence exhausted, nothing to materialize");
        return Ok(Vec::new());
    }

    let occurrences: Vec<MonetaryEntry> = DueOccurrences::new(rule, as_of)
        .map(|timestamp| {
            debug!(entry = %template_id, %timestamp, "Materializing occurrence");
            MonetaryEntry {
                id: Uuid::new_v4(),
                timestamp,
                ..template.clone()
            }
        })
        .collect();

    Ok(occurrences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LedgerError;
    use crate::core::models::{EntryKind, OwnerId, RecurrencePattern};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn recurring(
        pattern: RecurrencePattern,
        last: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> MonetaryEntry {
        MonetaryEntry {
            id: Uuid::new_v4(),
            owner: OwnerId::new("alice"),
            kind: EntryKind::Expense,
            amount: dec!(50),
            currency: "USD".to_string(),
            category: "Food".to_string(),
            tags: vec!["groceries".to_string()],
            normalized_amount: dec!(50),
            timestamp: last,
            recurrence: Some(RecurrenceRule {
                pattern,
                end_date: end,
                last_materialized: last,
            }),
            origin: None,
        }
    }

    fn last_materialized(entry: &MonetaryEntry) -> DateTime<Utc> {
        entry.recurrence.as_ref().unwrap().last_materialized
    }

    #[test]
    fn test_monthly_expense_up_to_as_of() {
        let mut entry = recurring(RecurrencePattern::Monthly, utc(2024, 1, 15), None);

        let posted = materialize_due(&mut entry, utc(2024, 4, 1)).unwrap();

        let dates: Vec<_> = posted.iter().map(|e| e.timestamp).collect();
        assert_eq!(dates, vec![utc(2024, 2, 15), utc(2024, 3, 15)]);
        assert_eq!(last_materialized(&entry), utc(2024, 3, 15));
        for occurrence in &posted {
            assert_eq!(occurrence.amount, dec!(50));
            assert_eq!(occurrence.currency, "USD");
            assert_eq!(occurrence.category, "Food");
            assert_eq!(occurrence.kind, EntryKind::Expense);
            assert_eq!(occurrence.origin, Some(entry.id));
            assert!(occurrence.recurrence.is_none());
            assert_ne!(occurrence.id, entry.id);
        }
    }

    #[test]
    fn test_second_call_with_same_as_of_is_empty() {
        let mut entry = recurring(RecurrencePattern::Weekly, utc(2024, 1, 1), None);

        assert_eq!(materialize_due(&mut entry, utc(2024, 1, 22)).unwrap().len(), 3);
        assert!(materialize_due(&mut entry, utc(2024, 1, 22)).unwrap().is_empty());
        assert!(materialize_due(&mut entry, utc(2024, 1, 28)).unwrap().is_empty());
        assert_eq!(materialize_due(&mut entry, utc(2024, 1, 29)).unwrap().len(), 1);
    }

    #[test]
    fn test_month_end_clamps() {
        let mut entry = recurring(RecurrencePattern::Monthly, utc(2024, 1, 31), None);
        let posted = materialize_due(&mut entry, utc(2024, 2, 29)).unwrap();
        assert_eq!(posted[0].timestamp, utc(2024, 2, 29));

        let mut entry = recurring(RecurrencePattern::Monthly, utc(2023, 1, 31), None);
        let posted = materialize_due(&mut entry, utc(2023, 3, 1)).unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].timestamp, utc(2023, 2, 28));
    }

    #[test]
    fn test_end_date_is_exclusive() {
        let mut entry = recurring(
            RecurrencePattern::Daily,
            utc(2024, 3, 1),
            Some(utc(2024, 3, 4)),
        );

        let posted = materialize_due(&mut entry, utc(2024, 3, 31)).unwrap();
        let dates: Vec<_> = posted.iter().map(|e| e.timestamp).collect();
        assert_eq!(dates, vec![utc(2024, 3, 2), utc(2024, 3, 3)]);
        assert!(entry.recurrence.as_ref().unwrap().is_exhausted());
        assert!(last_materialized(&entry) < utc(2024, 3, 4));
    }

    #[test]
    fn test_end_date_already_passed() {
        let mut entry = recurring(
            RecurrencePattern::Monthly,
            utc(2024, 5, 1),
            Some(utc(2024, 4, 1)),
        );

        assert!(materialize_due(&mut entry, utc(2025, 1, 1)).unwrap().is_empty());
        assert_eq!(last_materialized(&entry), utc(2024, 5, 1));
    }

    #[test]
    fn test_as_of_before_next_interval() {
        let mut entry = recurring(RecurrencePattern::Monthly, utc(2024, 1, 15), None);
        assert!(materialize_due(&mut entry, utc(2024, 2, 14)).unwrap().is_empty());
        assert_eq!(last_materialized(&entry), utc(2024, 1, 15));
    }

    #[test]
    fn test_non_recurring_entry_is_rejected() {
        let mut entry = recurring(RecurrencePattern::Daily, utc(2024, 1, 1), None);
        entry.recurrence = None;

        assert!(matches!(
            materialize_due(&mut entry, utc(2024, 2, 1)),
            Err(LedgerError::Validation(ValidationError::NotRecurring(_)))
        ));
    }

    #[test]
    fn test_iterator_is_lazy() {
        let mut rule = RecurrenceRule {
            pattern: RecurrencePattern::Daily,
            end_date: None,
            last_materialized: utc(2024, 1, 1),
        };

        let first = DueOccurrences::new(&mut rule, utc(2024, 12, 31)).next();
        assert_eq!(first, Some(utc(2024, 1, 2)));
        assert_eq!(rule.last_materialized, utc(2024, 1, 2));
    }
}
