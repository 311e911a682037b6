use crate::core::cache::{CacheEntry, SnapshotStore};
use crate::core::error::LedgerError;
use crate::core::ledger::{
    Ledger, Transaction, TransactionEntry, sort_ledger, validate_portfolio_name,
};
use crate::core::snapshot::Snapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionHandle, PersistMode};
use std::sync::Mutex;
use tracing::debug;

/// Snapshot cache backed by a fjall partition, one JSON value per symbol.
pub struct DiskSnapshotStore {
    partition: PartitionHandle,
}

impl DiskSnapshotStore {
    pub fn new(partition: PartitionHandle) -> Self {
        Self { partition }
    }
}

#[async_trait]
impl SnapshotStore for DiskSnapshotStore {
    async fn get(&self, symbol: &str) -> Result<Option<CacheEntry>> {
        let Some(value) = self.partition.get(symbol.as_bytes())? else {
            debug!("Cache MISS for key: {symbol}");
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_slice(&value)
            .with_context(|| format!("Corrupt cache entry for {symbol}"))?;
        debug!("Cache HIT for key: {symbol}");
        Ok(Some(entry))
    }

    async fn put(&self, symbol: &str, snapshot: &Snapshot, stored_at: DateTime<Utc>) -> Result<()> {
        let entry = CacheEntry {
            snapshot: snapshot.clone(),
            stored_at,
        };
        // A single insert replaces the whole value atomically.
        self.partition
            .insert(symbol.as_bytes(), serde_json::to_vec(&entry)?)?;
        debug!("Cache PUT for key: {symbol}");
        Ok(())
    }
}

fn storage_error(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

fn transaction_prefix(portfolio: &str) -> String {
    format!("{portfolio}\0")
}

fn transaction_key(portfolio: &str, sequence: u64) -> String {
    format!("{portfolio}\0{sequence:020}")
}

/// Durable ledger. Portfolios live in one partition; transactions in another,
/// keyed by portfolio and a zero-padded insertion sequence.
pub struct DiskLedger {
    keyspace: Keyspace,
    portfolios: PartitionHandle,
    transactions: PartitionHandle,
    append_lock: Mutex<()>,
}

impl DiskLedger {
    pub fn new(
        keyspace: Keyspace,
        portfolios: PartitionHandle,
        transactions: PartitionHandle,
    ) -> Self {
        Self {
            keyspace,
            portfolios,
            transactions,
            append_lock: Mutex::new(()),
        }
    }

    fn ensure_exists(&self, name: &str) -> Result<(), LedgerError> {
        if self
            .portfolios
            .contains_key(name.as_bytes())
            .map_err(storage_error)?
        {
            Ok(())
        } else {
            Err(LedgerError::UnknownPortfolio(name.to_string()))
        }
    }

    fn next_sequence(&self, name: &str) -> Result<u64, LedgerError> {
        let last = self
            .transactions
            .prefix(transaction_prefix(name).as_bytes())
            .next_back()
            .transpose()
            .map_err(storage_error)?;
        let Some((_, value)) = last else {
            return Ok(0);
        };
        let tx: Transaction = serde_json::from_slice(&value).map_err(storage_error)?;
        Ok(tx.sequence + 1)
    }
}

#[async_trait]
impl Ledger for DiskLedger {
    async fn create_portfolio(&self, name: &str) -> Result<(), LedgerError> {
        let name = validate_portfolio_name(name)?;
        let _guard = self.append_lock.lock().map_err(storage_error)?;
        if !self
            .portfolios
            .contains_key(name.as_bytes())
            .map_err(storage_error)?
        {
            self.portfolios
                .insert(name.as_bytes(), Utc::now().to_rfc3339().as_bytes())
                .map_err(storage_error)?;
            self.keyspace
                .persist(PersistMode::SyncAll)
                .map_err(storage_error)?;
            debug!("Created portfolio {name}");
        }
        Ok(())
    }

    async fn portfolios(&self) -> Result<Vec<String>, LedgerError> {
        self.portfolios
            .keys()
            .map(|key| {
                let key = key.map_err(storage_error)?;
                Ok(String::from_utf8_lossy(&key).into_owned())
            })
            .collect()
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

        let _guard = self.append_lock.lock().map_err(storage_error)?;
        self.ensure_exists(&name)?;
        let first_sequence = self.next_sequence(&name)?;

        let mut batch = self.keyspace.batch();
        let count = entries.len();
        for (offset, entry) in entries.into_iter().enumerate() {
            let sequence = first_sequence + offset as u64;
            let tx = Transaction::record(sequence, &name, entry);
            let value = serde_json::to_vec(&tx).map_err(storage_error)?;
            batch.insert(
                &self.transactions,
                transaction_key(&name, sequence).as_bytes(),
                value,
            );
        }
        batch.commit().map_err(storage_error)?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(storage_error)?;
        debug!("Appended {count} transactions to {name}");
        Ok(count)
    }

    async fn transactions_for(&self, portfolio: &str) -> Result<Vec<Transaction>, LedgerError> {
        let name = validate_portfolio_name(portfolio)?;
        self.ensure_exists(&name)?;

        let mut transactions = self
            .transactions
            .prefix(transaction_prefix(&name).as_bytes())
            .map(|item| {
                let (_, value) = item.map_err(storage_error)?;
                serde_json::from_slice::<Transaction>(&value).map_err(storage_error)
            })
            .collect::<Result<Vec<_>, _>>()?;
        sort_ledger(&mut transactions);
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;
    use serde_json::Map;
    use tempfile::tempdir;

    fn snapshot(price: f64) -> Snapshot {
        let mut info = Map::new();
        info.insert("shortName".to_string(), "Acme".into());
        info.insert("regularMarketPrice".to_string(), price.into());
        Snapshot {
            info,
            history: vec![crate::core::snapshot::HistoryBar::close_only(
                "2020-01-01".parse().unwrap(),
                price,
            )],
            events: None,
        }
    }

    fn entry(symbol: &str, quantity: f64, date: &str) -> TransactionEntry {
        TransactionEntry {
            symbol: symbol.to_string(),
            quantity,
            price: 10.0,
            date: date.parse().unwrap(),
            label: Some("lab".to_string()),
        }
    }

    #[tokio::test]
    async fn test_disk_snapshot_get_put() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let store = db.snapshot_store().unwrap();

        assert!(store.get("AAA").await.unwrap().is_none());

        let stored_at = Utc::now();
        store.put("AAA", &snapshot(1.0), stored_at).await.unwrap();
        store.put("AAA", &snapshot(2.0), stored_at).await.unwrap();

        let entry = store.get("AAA").await.unwrap().unwrap();
        assert_eq!(entry.snapshot, snapshot(2.0));
        assert_eq!(entry.stored_at, stored_at);
        assert!(store.get("BBB").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_ledger_append_and_read() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let ledger = db.ledger().unwrap();

        ledger.create_portfolio("p1").await.unwrap();
        ledger.create_portfolio("p10").await.unwrap();
        ledger
            .append(
                "p1",
                &[entry("BBB", 2.0, "2020-01-05"), entry("aaa", 1.0, "2020-01-01")],
            )
            .await
            .unwrap();
        ledger
            .append("p10", &[entry("ZZZ", 1.0, "2020-01-01")])
            .await
            .unwrap();
        ledger
            .append("p1", &[entry("CCC", 3.0, "2020-01-01")])
            .await
            .unwrap();

        let txs = ledger.transactions_for("p1").await.unwrap();
        let summary: Vec<_> = txs.iter().map(|t| (t.symbol.as_str(), t.sequence)).collect();
        assert_eq!(summary, vec![("AAA", 1), ("CCC", 2), ("BBB", 0)]);
        assert_eq!(txs[0].label.as_deref(), Some("lab"));
        assert_eq!(ledger.transactions_for("p10").await.unwrap().len(), 1);
        assert_eq!(
            ledger.portfolios().await.unwrap(),
            vec!["p1".to_string(), "p10".to_string()]
        );
    }

    #[tokio::test]
    async fn test_disk_ledger_unknown_portfolio() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let ledger = db.ledger().unwrap();

        assert!(matches!(
            ledger.transactions_for("nope").await,
            Err(LedgerError::UnknownPortfolio(_))
        ));
        assert!(matches!(
            ledger.append("nope", &[entry("AAA", 1.0, "2020-01-01")]).await,
            Err(LedgerError::UnknownPortfolio(_))
        ));
    }

    #[tokio::test]
    async fn test_disk_data_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let db = Database::open(dir.path()).unwrap();
            let ledger = db.ledger().unwrap();
            ledger.create_portfolio("p1").await.unwrap();
            ledger
                .append("p1", &[entry("AAA", 1.0, "2020-01-01")])
                .await
                .unwrap();
            db.snapshot_store()
                .unwrap()
                .put("AAA", &snapshot(3.0), Utc::now())
                .await
                .unwrap();
            db.persist().unwrap();
        }

        let db = Database::open(dir.path()).unwrap();
        let txs = db.ledger().unwrap().transactions_for("p1").await.unwrap();
        assert_eq!(txs.len(), 1);
        let cached = db.snapshot_store().unwrap().get("AAA").await.unwrap().unwrap();
        assert_eq!(cached.snapshot.current_price(), Some(3.0));
    }
}
