pub mod budgets;
pub mod goals;
pub mod notifications;
pub mod setup;
pub mod transactions;
pub mod ui;
