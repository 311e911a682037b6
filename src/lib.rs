pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::{self, AppConfig};
use crate::core::{Ledger, SnapshotResolver, TransactionEntry, Valuation};
use crate::providers::{GeminiTransactionParser, YahooSnapshotFetcher};
use crate::store::Database;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    Quote {
        symbols: Vec<String>,
        max_age_hours: Option<u64>,
        refresh: bool,
    },
    Status {
        portfolio: String,
    },
    Performance {
        portfolio: String,
    },
    Add {
        portfolio: String,
        entry: TransactionEntry,
    },
    Import {
        file: Option<PathBuf>,
        portfolio: Option<String>,
    },
    Portfolios,
}

/// The wired-up stores and services shared by all commands.
pub struct App {
    pub config: AppConfig,
    pub ledger: Arc<dyn Ledger>,
    pub resolver: Arc<SnapshotResolver>,
    db: Database,
}

impl App {
    pub fn open(config: AppConfig) -> Result<Self> {
        let data_path = config.default_data_path()?;
        let db = Database::open(&data_path)?;

        let fetcher = YahooSnapshotFetcher::new(
            &config.providers.yahoo.base_url,
            &config.providers.yahoo.range,
        )?;
        let resolver = SnapshotResolver::new(Arc::new(db.snapshot_store()?), Arc::new(fetcher))
            .with_single_flight(config.cache.single_flight);

        Ok(Self {
            ledger: Arc::new(db.ledger()?),
            resolver: Arc::new(resolver),
            config,
            db,
        })
    }

    pub fn valuation(&self) -> Valuation {
        Valuation::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.resolver),
            self.config.cache.max_age(),
        )
    }

    pub async fn execute(&self, command: AppCommand, json: bool) -> Result<()> {
        match command {
            AppCommand::Quote {
                symbols,
                max_age_hours,
                refresh,
            } => {
                let max_age = if refresh {
                    Duration::ZERO
                } else {
                    max_age_hours
                        .map(config::hours)
                        .unwrap_or_else(|| self.config.cache.max_age())
                };
                cli::quote::run(&self.resolver, &symbols, max_age, json).await
            }
            AppCommand::Status { portfolio } => {
                cli::status::run(&self.valuation(), &portfolio, json).await
            }
            AppCommand::Performance { portfolio } => {
                cli::performance::run(&self.valuation(), &portfolio, json).await
            }
            AppCommand::Add { portfolio, entry } => {
                cli::transactions::add(self.ledger.as_ref(), &portfolio, entry).await
            }
            AppCommand::Import { file, portfolio } => {
                let parser = GeminiTransactionParser::from_config(&self.config.providers.gemini)?;
                cli::transactions::import(
                    &parser,
                    self.ledger.as_ref(),
                    file.as_deref(),
                    portfolio.as_deref(),
                    json,
                )
                .await
            }
            AppCommand::Portfolios => {
                cli::transactions::list_portfolios(self.ledger.as_ref(), json).await
            }
        }
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>, json: bool) -> Result<()> {
    info!("tickerfolio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::open(config)?;
    let result = app.execute(command, json).await;
    app.db.persist()?;
    result
}
