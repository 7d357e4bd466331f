use super::ui;
use crate::core::LedgerService;
use crate::core::models::{Goal, NewGoal, OwnerId};
use anyhow::Result;
use comfy_table::{Cell, Table};
use uuid::Uuid;

pub fn goals_table(goals: &[Goal], currency: &str) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Goal"),
        ui::header_cell(&format!("Target ({currency})")),
        ui::header_cell("By"),
        ui::header_cell("Done"),
        ui::header_cell("Id"),
    ]);
    for goal in goals {
        table.add_row(vec![
            Cell::new(&goal.title),
            ui::format_optional_cell(goal.target_amount, |a| format!("{a:.2}")),
            ui::format_optional_cell(goal.target_date, |d| d.to_string()),
            ui::flag_cell(goal.completed, false),
            Cell::new(ui::style_text(&goal.id.to_string(), ui::StyleType::Subtle)),
        ]);
    }
    table
}

pub async fn add(ledger: &LedgerService, owner: &OwnerId, request: NewGoal) -> Result<()> {
    let goal = ledger.create_goal(owner, request).await?;
    println!("Created goal '{}' ({})", goal.title, goal.id);
    Ok(())
}

pub async fn done(ledger: &LedgerService, owner: &OwnerId, id: Uuid) -> Result<()> {
    let goal = ledger.complete_goal(owner, id).await?;
    println!("Goal '{}' marked as done", goal.title);
    Ok(())
}

pub async fn list(ledger: &LedgerService, owner: &OwnerId) -> Result<()> {
    let goals = ledger.list_goals(owner).await?;
    if goals.is_empty() {
        println!("No goals yet.");
        return Ok(());
    }
    println!(
        "{}",
        goals_table(&goals, &ledger.accounting_currency().to_string())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_goals_table() {
        let goals = vec![
            Goal {
                id: Uuid::new_v4(),
                owner: OwnerId::new("alice"),
                title: "Emergency fund".to_string(),
                description: None,
                target_amount: Some(dec!(5000)),
                target_date: NaiveDate::from_ymd_opt(2025, 6, 30),
                completed: false,
                created_at: Utc::now(),
            },
            Goal {
                id: Uuid::new_v4(),
                owner: OwnerId::new("alice"),
                title: "Read more".to_string(),
                description: None,
                target_amount: None,
                target_date: None,
                completed: true,
                created_at: Utc::now(),
            },
        ];

        let rendered = goals_table(&goals, "USD").to_string();
        assert!(rendered.contains("Emergency fund"));
        assert!(rendered.contains("5000.00"));
        assert!(rendered.contains("2025-06-30"));
        assert!(rendered.contains("N/A"));
        assert!(rendered.contains("yes"));
    }
}
