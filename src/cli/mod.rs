pub mod budget;
pub mod ingest;
pub mod init;
pub mod recalculate;
pub mod report;
pub mod serve;
pub mod setmenu;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dompet",
    about = "Personal finance tracker: email ingestion, budgets, and period reports."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up dompet: choose a data directory and initialize the database.
    Init {
        /// Path for dompet data (default: ~/Documents/dompet)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Run the HTTP ingestion server.
    Serve,
    /// Ingest one email payload from a JSON file (use - for stdin).
    Ingest {
        /// Path to a JSON email payload
        file: String,
    },
    /// Rebuild every period summary from settled transactions.
    Recalculate,
    /// Manage budgets.
    Budget {
        #[command(subcommand)]
        command: BudgetCommands,
    },
    /// Period reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Register the bot command list and chat menu button with Telegram.
    Setmenu,
}

#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Set the budget for a subcategory in the current period.
    Set {
        /// Subcategory id (UUID)
        subcategory: String,
        /// Budgeted amount in whole rupiah
        amount: i64,
        /// Owner user id (UUID); defaults to the configured owner
        #[arg(long)]
        user: Option<String>,
    },
    /// Show the most recent prior-period budget for a subcategory.
    Prev {
        /// Subcategory id (UUID)
        subcategory: String,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Recent periods with computed summaries.
    Periods,
    /// What has been spent today.
    Today,
    /// Income, expenses, and net for the current period.
    Period {
        /// Period start date (YYYY-MM-DD), defaults to the current period
        #[arg(long)]
        start: Option<String>,
    },
    /// Budget vs actual per subcategory.
    Breakdown {
        #[arg(long)]
        start: Option<String>,
    },
    /// Settled transactions, paged.
    Transactions {
        /// expense or income
        #[arg(default_value = "expense")]
        flow: String,
        /// Zero-based page number
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long)]
        start: Option<String>,
    },
    /// Transactions still awaiting confirmation.
    Pending,
}
