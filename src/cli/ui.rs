use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use crate::core::Currency;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use rust_decimal::Decimal;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    TotalValue,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Amount printed with the minor units of `currency`.
pub fn format_amount(amount: Decimal, currency: Currency) -> String {
    format!("{:.*}", currency.minor_units() as usize, amount)
}

/// Right aligned money amount.
pub fn amount_cell(amount: Decimal, currency: Currency) -> Cell {
    Cell::new(format_amount(amount, currency)).set_alignment(CellAlignment::Right)
}

/// Formats an `Option<T>` into a `Cell`. `None` is displayed as "N/A".
pub fn format_optional_cell<T>(value: Option<T>, format_fn: impl Fn(T) -> String) -> Cell {
    value.map_or(
        Cell::new("N/A")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
        |v| Cell::new(format_fn(v)).set_alignment(CellAlignment::Right),
    )
}

/// Remaining budget, red once it goes negative.
pub fn remaining_cell(remaining: Decimal, currency: Currency) -> Cell {
    let color = if remaining.is_sign_negative() {
        Color::Red
    } else {
        Color::Green
    };
    amount_cell(remaining, currency).fg(color)
}

/// Yes/no flag cell; `alert` picks the color used for "yes".
pub fn flag_cell(value: bool, alert: bool) -> Cell {
    if !value {
        return Cell::new("no").fg(Color::DarkGrey);
    }
    let cell = Cell::new("yes").add_attribute(Attribute::Bold);
    if alert {
        cell.fg(Color::Red)
    } else {
        cell.fg(Color::Green)
    }
}

/// Prints a separator line matching the terminal width.
pub fn print_separator() {
    let term_width = console::Term::stdout()
        .size_checked()
        .map(|(_, w)| w as usize)
        .unwrap_or(80);
    println!("\n{}", "─".repeat(term_width));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_amount_follows_minor_units() {
        let usd = Currency::from_code("USD").unwrap();
        let jpy = Currency::from_code("JPY").unwrap();
        let kwd = Currency::from_code("KWD").unwrap();

        assert_eq!(format_amount(dec!(12.5), usd), "12.50");
        assert_eq!(format_amount(dec!(1500), jpy), "1500");
        assert_eq!(format_amount(dec!(3.125), kwd), "3.125");
    }
}
