//! Snapshot fetching abstraction

use super::error::MarketDataError;
use super::snapshot::Snapshot;
use async_trait::async_trait;

/// Retrieves a fresh snapshot for a symbol from an external data source.
///
/// Implementations report a non-existent instrument as
/// [`MarketDataError::SymbolNotFound`] and any transient failure as
/// [`MarketDataError::FetchUnavailable`].
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, symbol: &str) -> Result<Snapshot, MarketDataError>;
}
