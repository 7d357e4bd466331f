use super::ui;
use crate::core::LedgerService;
use crate::core::models::{NotificationEvent, OwnerId};
use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use uuid::Uuid;

pub fn notifications_table(events: &[NotificationEvent]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("When"),
        ui::header_cell("Kind"),
        ui::header_cell("Message"),
        ui::header_cell("Id"),
    ]);
    for event in events {
        let message = if event.read {
            Cell::new(&event.message).fg(Color::DarkGrey)
        } else {
            Cell::new(&event.message)
        };
        table.add_row(vec![
            Cell::new(event.created_at.format("%Y-%m-%d %H:%M")),
            Cell::new(event.kind),
            message,
            Cell::new(ui::style_text(&event.id.to_string(), ui::StyleType::Subtle)),
        ]);
    }
    table
}

/// Lists notifications, newest first, or marks one as read.
pub async fn run(ledger: &LedgerService, owner: &OwnerId, mark_read: Option<Uuid>) -> Result<()> {
    if let Some(id) = mark_read {
        let event = ledger.mark_notification_read(owner, id).await?;
        println!("Marked '{}' as read", event.message);
        return Ok(());
    }

    let events = ledger.list_notifications(owner).await?;
    if events.is_empty() {
        println!("No notifications.");
        return Ok(());
    }
    let unread = events.iter().filter(|e| !e.read).count();
    println!(
        "\n{}\n",
        ui::style_text(&format!("Notifications ({unread} unread)"), ui::StyleType::Title)
    );
    println!("{}", notifications_table(&events));
    Ok(())
}
