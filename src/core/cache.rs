//! Snapshot cache abstractions

use super::snapshot::Snapshot;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored snapshot and the moment it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub snapshot: Snapshot,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// True while the entry is younger than `max_age` at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: std::time::Duration) -> bool {
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => now.signed_duration_since(self.stored_at) < max_age,
            // Larger than chrono can represent: never stale.
            Err(_) => true,
        }
    }
}

/// Persistent symbol -> snapshot mapping, at most one entry per symbol.
///
/// `put` replaces the whole entry atomically; readers never see a partial write.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, symbol: &str) -> Result<Option<CacheEntry>>;
    async fn put(&self, symbol: &str, snapshot: &Snapshot, stored_at: DateTime<Utc>) -> Result<()>;
}
