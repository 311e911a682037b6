pub mod disk;
pub mod memory;

use anyhow::{Context, Result};
use disk::{DiskLedger, DiskSnapshotStore};
use fjall::{Keyspace, PartitionCreateOptions, PersistMode};
use std::path::Path;
use tracing::debug;

const SNAPSHOTS: &str = "snapshots";
const PORTFOLIOS: &str = "portfolios";
const TRANSACTIONS: &str = "transactions";

/// The on-disk keyspace holding the snapshot cache and the ledger.
pub struct Database {
    keyspace: Keyspace,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;
        let keyspace = fjall::Config::new(path.join("db"))
            .open()
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        debug!("Opened database at {}", path.display());
        Ok(Self { keyspace })
    }

    pub fn snapshot_store(&self) -> Result<DiskSnapshotStore> {
        let partition = self
            .keyspace
            .open_partition(SNAPSHOTS, PartitionCreateOptions::default())
            .context("Failed to open snapshot cache")?;
        Ok(DiskSnapshotStore::new(partition))
    }

    pub fn ledger(&self) -> Result<DiskLedger> {
        let portfolios = self
            .keyspace
            .open_partition(PORTFOLIOS, PartitionCreateOptions::default())
            .context("Failed to open portfolio partition")?;
        let transactions = self
            .keyspace
            .open_partition(TRANSACTIONS, PartitionCreateOptions::default())
            .context("Failed to open transaction partition")?;
        Ok(DiskLedger::new(
            self.keyspace.clone(),
            portfolios,
            transactions,
        ))
    }

    /// Flushes pending writes to disk.
    pub fn persist(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist database")
    }
}
