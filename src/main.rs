use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use finledger::AppCommand;
use finledger::cli::setup::setup;
use finledger::core::log::init_logging;
use finledger::core::models::{EntryKind, NewGoal, NewRecurrence, NewTransaction, RecurrencePattern};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert an amount into the accounting currency
    Convert { amount: Decimal, currency: String },
    /// Record an income or expense
    Add {
        /// income or expense
        kind: EntryKind,
        amount: Decimal,
        currency: String,
        category: String,
        /// Tag to attach; repeat for several
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Date of the transaction (YYYY-MM-DD), defaults to now
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Repeat daily, weekly or monthly
        #[arg(short, long)]
        repeat: Option<RecurrencePattern>,
        /// Stop repeating before this date (YYYY-MM-DD)
        #[arg(long, requires = "repeat")]
        until: Option<NaiveDate>,
    },
    /// Manage budget limits
    #[command(subcommand)]
    Budget(BudgetCommands),
    /// Manage savings goals
    #[command(subcommand)]
    Goal(GoalCommands),
    /// Display spending per category against budgets
    Trends {
        /// Include every transaction instead of the current period
        #[arg(long)]
        all: bool,
    },
    /// Post recurring transactions that are due
    Recur {
        /// Post occurrences up to this date (YYYY-MM-DD), defaults to now
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// List notifications
    Notifications {
        /// Mark the notification with this id as read
        #[arg(long)]
        mark_read: Option<Uuid>,
    },
}

#[derive(Subcommand)]
enum BudgetCommands {
    /// Set the spending limit of a category
    Set { category: String, limit: Decimal },
    /// Remove the limit of a category
    Remove { category: String },
    /// List budget limits
    List,
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Create a savings goal
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Amount to save, in the accounting currency
        #[arg(long)]
        target: Option<Decimal>,
        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        by: Option<NaiveDate>,
    },
    /// Mark a goal as done
    Done { id: Uuid },
    /// List goals
    List,
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Convert { amount, currency } => AppCommand::Convert { amount, currency },
            Commands::Add {
                kind,
                amount,
                currency,
                category,
                tags,
                date,
                repeat,
                until,
            } => AppCommand::Add(NewTransaction {
                kind,
                amount,
                currency,
                category,
                tags,
                date: date.map(start_of_day),
                recurrence: repeat.map(|pattern| NewRecurrence {
                    pattern,
                    end_date: until.map(start_of_day),
                }),
            }),
            Commands::Budget(BudgetCommands::Set { category, limit }) => {
                AppCommand::BudgetSet { category, limit }
            }
            Commands::Budget(BudgetCommands::Remove { category }) => {
                AppCommand::BudgetRemove { category }
            }
            Commands::Budget(BudgetCommands::List) => AppCommand::BudgetList,
            Commands::Goal(GoalCommands::Add {
                title,
                description,
                target,
                by,
            }) => AppCommand::GoalAdd(NewGoal {
                title,
                description,
                target_amount: target,
                target_date: by,
            }),
            Commands::Goal(GoalCommands::Done { id }) => AppCommand::GoalDone { id },
            Commands::Goal(GoalCommands::List) => AppCommand::GoalList,
            Commands::Trends { all } => AppCommand::Trends { all },
            Commands::Recur { as_of } => AppCommand::Recur {
                as_of: as_of.map(start_of_day),
            },
            Commands::Notifications { mark_read } => AppCommand::Notifications { mark_read },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => finledger::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
