use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tickerfolio::core::TransactionEntry;
use tickerfolio::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show market data for one or more symbols
    Quote {
        #[arg(required = true)]
        symbols: Vec<String>,
        /// Maximum age of cached data in hours
        #[arg(long)]
        max_age_hours: Option<u64>,
        /// Ignore cached data and fetch again
        #[arg(long)]
        refresh: bool,
    },
    /// Display current holdings and total value
    Status { portfolio: String },
    /// Display daily portfolio value since the first transaction
    Performance { portfolio: String },
    /// Record a transaction (negative quantity for a sale)
    Add {
        portfolio: String,
        symbol: String,
        #[arg(allow_negative_numbers = true)]
        quantity: f64,
        price: f64,
        /// Trade date as YYYY-MM-DD
        date: NaiveDate,
        #[arg(short, long)]
        label: Option<String>,
    },
    /// Extract transactions from free text and record them
    Import {
        /// Read text from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Portfolio for transactions that do not name one
        #[arg(short, long)]
        portfolio: Option<String>,
    },
    /// List portfolios
    Portfolios,
}

impl From<Commands> for tickerfolio::AppCommand {
    fn from(cmd: Commands) -> tickerfolio::AppCommand {
        match cmd {
            Commands::Quote {
                symbols,
                max_age_hours,
                refresh,
            } => tickerfolio::AppCommand::Quote {
                symbols,
                max_age_hours,
                refresh,
            },
            Commands::Status { portfolio } => tickerfolio::AppCommand::Status { portfolio },
            Commands::Performance { portfolio } => {
                tickerfolio::AppCommand::Performance { portfolio }
            }
            Commands::Add {
                portfolio,
                symbol,
                quantity,
                price,
                date,
                label,
            } => tickerfolio::AppCommand::Add {
                portfolio,
                entry: TransactionEntry {
                    symbol,
                    quantity,
                    price,
                    date,
                    label,
                },
            },
            Commands::Import { file, portfolio } => {
                tickerfolio::AppCommand::Import { file, portfolio }
            }
            Commands::Portfolios => tickerfolio::AppCommand::Portfolios,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => tickerfolio::cli::setup::setup(),
        Some(cmd) => {
            tickerfolio::run_command(cmd.into(), cli.config_path.as_deref(), cli.json).await
        }
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
