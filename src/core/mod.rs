//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod ingest;
pub mod ledger;
pub mod log;
pub mod parser;
pub mod resolver;
pub mod snapshot;
pub mod valuation;

// Re-export main types for cleaner imports
pub use cache::{CacheEntry, SnapshotStore};
pub use error::{LedgerError, MarketDataError, ParseError};
pub use fetcher::SnapshotFetcher;
pub use ledger::{Ledger, Positions, Transaction, TransactionEntry, aggregate};
pub use parser::{ParsedTransaction, TransactionParser};
pub use resolver::SnapshotResolver;
pub use snapshot::{Origin, Snapshot};
pub use valuation::{Holding, PerformancePoint, PortfolioStatus, Valuation};
