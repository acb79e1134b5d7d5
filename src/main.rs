mod aggregate;
mod cli;
mod compat;
mod db;
mod error;
mod extractor;
mod fmt;
mod ingest;
mod models;
mod normalize;
mod notify;
mod period;
mod reports;
mod server;
mod settings;

use clap::Parser;

use cli::{BudgetCommands, Cli, Commands, ReportCommands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Serve => cli::serve::run(),
        Commands::Ingest { file } => cli::ingest::run(&file),
        Commands::Recalculate => cli::recalculate::run(),
        Commands::Budget { command } => match command {
            BudgetCommands::Set {
                subcategory,
                amount,
                user,
            } => cli::budget::set(&subcategory, amount, user.as_deref()),
            BudgetCommands::Prev { subcategory } => cli::budget::prev(&subcategory),
        },
        Commands::Report { command } => match command {
            ReportCommands::Periods => cli::report::periods(),
            ReportCommands::Today => cli::report::today(),
            ReportCommands::Period { start } => cli::report::period(start),
            ReportCommands::Breakdown { start } => cli::report::breakdown(start),
            ReportCommands::Transactions { flow, page, start } => {
                cli::report::transactions(&flow, page, start)
            }
            ReportCommands::Pending => cli::report::pending(),
        },
        Commands::Setmenu => cli::setmenu::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
