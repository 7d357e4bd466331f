use super::ui;
use crate::core::models::{MonetaryEntry, NewTransaction, OwnerId};
use crate::core::{Currency, LedgerService};
use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

/// Table of ledger lines with raw and normalized amounts side by side.
pub fn entries_table(entries: &[MonetaryEntry], accounting: Currency) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Kind"),
        ui::header_cell("Category"),
        ui::header_cell("Amount"),
        ui::header_cell(&format!("Amount ({accounting})")),
        ui::header_cell("Repeats"),
    ]);

    for entry in entries {
        let repeats = entry
            .recurrence
            .as_ref()
            .map(|rule| rule.pattern.to_string());
        table.add_row(vec![
            Cell::new(entry.timestamp.date_naive()),
            Cell::new(entry.kind),
            Cell::new(&entry.category),
            Cell::new(format!("{} {}", entry.amount, entry.currency)),
            ui::amount_cell(entry.normalized_amount, accounting),
            ui::format_optional_cell(repeats, |p| p),
        ]);
    }
    table
}

pub async fn convert(ledger: &LedgerService, amount: Decimal, currency: &str) -> Result<()> {
    let converted = ledger.normalize(amount, currency).await?;
    println!(
        "{amount} {} = {}",
        currency.trim().to_uppercase(),
        ui::style_text(
            &format!("{converted} {}", ledger.accounting_currency()),
            ui::StyleType::TotalValue
        )
    );
    Ok(())
}

pub async fn add(ledger: &LedgerService, owner: &OwnerId, request: NewTransaction) -> Result<()> {
    let entry = ledger.submit_transaction(owner, request).await?;
    println!(
        "{}",
        entries_table(std::slice::from_ref(&entry), ledger.accounting_currency())
    );
    println!(
        "{}",
        ui::style_text(&format!("id: {}", entry.id), ui::StyleType::Subtle)
    );
    Ok(())
}

pub async fn recur(ledger: &LedgerService, owner: &OwnerId, as_of: DateTime<Utc>) -> Result<()> {
    let posted = ledger.post_recurring(owner, as_of).await?;
    if posted.is_empty() {
        println!("No recurring transactions due as of {}.", as_of.date_naive());
        return Ok(());
    }

    println!(
        "\n{}\n",
        ui::style_text(
            &format!("Posted {} recurring transaction(s)", posted.len()),
            ui::StyleType::Title
        )
    );
    println!("{}", entries_table(&posted, ledger.accounting_currency()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{EntryKind, RecurrencePattern, RecurrenceRule};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_entries_table_shows_both_amounts() {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let entries = vec![
            MonetaryEntry {
                id: Uuid::new_v4(),
                owner: OwnerId::new("alice"),
                kind: EntryKind::Expense,
                amount: dec!(100),
                currency: "EUR".to_string(),
                category: "Travel".to_string(),
                tags: vec![],
                normalized_amount: dec!(108.00),
                timestamp,
                recurrence: None,
                origin: None,
            },
            MonetaryEntry {
                id: Uuid::new_v4(),
                owner: OwnerId::new("alice"),
                kind: EntryKind::Income,
                amount: dec!(3000),
                currency: "USD".to_string(),
                category: "Salary".to_string(),
                tags: vec![],
                normalized_amount: dec!(3000),
                timestamp,
                recurrence: Some(RecurrenceRule {
                    pattern: RecurrencePattern::Monthly,
                    end_date: None,
                    last_materialized: timestamp,
                }),
                origin: None,
            },
        ];

        let rendered = entries_table(&entries, Currency::from_code("USD").unwrap()).to_string();
        assert!(rendered.contains("Amount (USD)"));
        assert!(rendered.contains("2024-03-01"));
        assert!(rendered.contains("100 EUR"));
        assert!(rendered.contains("108.00"));
        assert!(rendered.contains("3000.00"));
        assert!(rendered.contains("monthly"));
        assert!(rendered.contains("N/A"));
    }
}
