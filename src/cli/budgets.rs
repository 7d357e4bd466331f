use super::ui;
use crate::core::{Currency, LedgerService};
use crate::core::models::OwnerId;
use crate::core::spending::{BudgetStatus, DateWindow, SpendingTrend};
use anyhow::Result;
use chrono::Utc;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

pub fn trends_table(trends: &SpendingTrend, currency: Currency) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Category"),
        ui::header_cell(&format!("Spent ({currency})")),
    ]);
    for (category, total) in trends {
        table.add_row(vec![Cell::new(category), ui::amount_cell(*total, currency)]);
    }
    table
}

pub fn budget_table(report: &[BudgetStatus], currency: Currency) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Category"),
        ui::header_cell(&format!("Limit ({currency})")),
        ui::header_cell("Spent"),
        ui::header_cell("Remaining"),
        ui::header_cell("Over"),
    ]);
    for status in report {
        table.add_row(vec![
            Cell::new(&status.category),
            ui::amount_cell(status.limit, currency),
            ui::amount_cell(status.spent, currency),
            ui::remaining_cell(status.remaining, currency),
            ui::flag_cell(status.breached, true),
        ]);
    }
    table
}

pub async fn set(
    ledger: &LedgerService,
    owner: &OwnerId,
    category: &str,
    limit: Decimal,
) -> Result<()> {
    let budget = ledger.set_budget(owner, category, limit).await?;
    println!(
        "Budget for '{}' set to {} {}",
        budget.category,
        budget.limit,
        ledger.accounting_currency()
    );
    Ok(())
}

pub async fn remove(ledger: &LedgerService, owner: &OwnerId, category: &str) -> Result<()> {
    let budget = ledger.delete_budget(owner, category).await?;
    println!("Removed budget for '{}'", budget.category);
    Ok(())
}

pub async fn list(ledger: &LedgerService, owner: &OwnerId) -> Result<()> {
    let budgets = ledger.list_budgets(owner).await?;
    if budgets.is_empty() {
        println!("No budgets configured.");
        return Ok(());
    }

    let currency = ledger.accounting_currency();
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Category"),
        ui::header_cell(&format!("Limit ({currency})")),
    ]);
    for budget in &budgets {
        table.add_row(vec![
            Cell::new(&budget.category),
            ui::amount_cell(budget.limit, currency),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Spending per category and budget standing for the current period, or
/// for the whole ledger with `all`.
pub async fn trends(ledger: &LedgerService, owner: &OwnerId, all: bool) -> Result<()> {
    let window = if all {
        DateWindow::all()
    } else {
        ledger.budget_window().window_for(Utc::now())
    };
    let currency = ledger.accounting_currency();

    let trends = ledger.spending_trends(owner, &window).await?;
    let report = ledger.budget_report(owner, &window).await?;

    println!(
        "\n{}\n",
        ui::style_text("Spending by category", ui::StyleType::Title)
    );
    if trends.is_empty() {
        println!("{}", ui::style_text("No expenses recorded.", ui::StyleType::Subtle));
    } else {
        println!("{}", trends_table(&trends, currency));
        let total = trends
            .values()
            .fold(Decimal::ZERO, |acc, amount| acc.saturating_add(*amount));
        println!(
            "\n{}: {}",
            ui::style_text(&format!("Total ({currency})"), ui::StyleType::TotalLabel),
            ui::style_text(&ui::format_amount(total, currency), ui::StyleType::TotalValue)
        );
    }

    if !report.is_empty() {
        ui::print_separator();
        println!("\n{}\n", ui::style_text("Budgets", ui::StyleType::Title));
        println!("{}", budget_table(&report, currency));
        let over = report.iter().filter(|s| s.breached).count();
        if over > 0 {
            println!(
                "\n{}",
                ui::style_text(
                    &format!("{over} budget(s) exceeded"),
                    ui::StyleType::Error
                )
            );
        }
    }
    Ok(())
}
