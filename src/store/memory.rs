use crate::core::cache::{CacheEntry, SnapshotStore};
use crate::core::error::LedgerError;
use crate::core::ledger::{
    Ledger, Transaction, TransactionEntry, sort_ledger, validate_portfolio_name,
};
use crate::core::snapshot::Snapshot;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory snapshot cache. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<HashMap<String, CacheEntry>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, symbol: &str) -> Result<Option<CacheEntry>> {
        let cache = self.inner.lock().await;
        let entry = cache.get(symbol).cloned();
        if entry.is_some() {
            debug!("Cache HIT for key: {symbol}");
        } else {
            debug!("Cache MISS for key: {symbol}");
        }
        Ok(entry)
    }

    async fn put(&self, symbol: &str, snapshot: &Snapshot, stored_at: DateTime<Utc>) -> Result<()> {
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {symbol}");
        cache.insert(
            symbol.to_string(),
            CacheEntry {
                snapshot: snapshot.clone(),
                stored_at,
            },
        );
        Ok(())
    }
}

#[derive(Default)]
struct LedgerState {
    portfolios: BTreeMap<String, Vec<Transaction>>,
    next_sequence: u64,
}

/// In-memory ledger.
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn create_portfolio(&self, name: &str) -> Result<(), LedgerError> {
        let name = validate_portfolio_name(name)?;
        let mut state = self.inner.lock().await;
        state.portfolios.entry(name).or_default();
        Ok(())
    }

    async fn portfolios(&self) -> Result<Vec<String>, LedgerError> {
        let state = self.inner.lock().await;
        Ok(state.portfolios.keys().cloned().collect())
    }

    async fn append(
        &self,
        portfolio: &str,
        entries: &[TransactionEntry],
    ) -> Result<usize, LedgerError> {
        let name = validate_portfolio_name(portfolio)?;
        let entries = entries
            .iter()
            .map(TransactionEntry::validated)
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = self.inner.lock().await;
        let first_sequence = state.next_sequence;
        let ledger = state
            .portfolios
            .get_mut(&name)
            .ok_or_else(|| LedgerError::UnknownPortfolio(name.clone()))?;

        let count = entries.len();
        for (offset, entry) in entries.into_iter().enumerate() {
            ledger.push(Transaction::record(first_sequence + offset as u64, &name, entry));
        }
        state.next_sequence += count as u64;
        Ok(count)
    }

    async fn transactions_for(&self, portfolio: &str) -> Result<Vec<Transaction>, LedgerError> {
        let name = validate_portfolio_name(portfolio)?;
        let state = self.inner.lock().await;
        let mut transactions = state
            .portfolios
            .get(&name)
            .cloned()
            .ok_or(LedgerError::UnknownPortfolio(name))?;
        sort_ledger(&mut transactions);
        Ok(transactions)
    }
}
