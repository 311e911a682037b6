//! Cache-or-fetch resolution of market data snapshots

use super::cache::SnapshotStore;
use super::error::MarketDataError;
use super::fetcher::SnapshotFetcher;
use super::snapshot::{Origin, Snapshot, normalize_symbol};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Serves snapshots from the store while they are fresh, otherwise fetches
/// and overwrites the stored entry.
///
/// A failed fetch is surfaced as-is; a stale entry is never returned in its
/// place. With single-flight enabled, concurrent resolutions of one symbol
/// are serialised so that only the first miss reaches the fetcher.
pub struct SnapshotResolver {
    store: Arc<dyn SnapshotStore>,
    fetcher: Arc<dyn SnapshotFetcher>,
    in_flight: Option<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SnapshotResolver {
    pub fn new(store: Arc<dyn SnapshotStore>, fetcher: Arc<dyn SnapshotFetcher>) -> Self {
        Self {
            store,
            fetcher,
            in_flight: None,
        }
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(|| Mutex::new(HashMap::new()));
        self
    }

    #[instrument(name = "ResolveSnapshot", skip(self), fields(symbol = %symbol))]
    pub async fn resolve(
        &self,
        symbol: &str,
        max_age: Duration,
    ) -> Result<(Snapshot, Origin), MarketDataError> {
        let symbol = normalize_symbol(symbol)?;

        let Some(in_flight) = &self.in_flight else {
            return self.resolve_unguarded(&symbol, max_age).await;
        };

        let guard = {
            let mut map = in_flight.lock().await;
            Arc::clone(map.entry(symbol.clone()).or_default())
        };
        let result = {
            let _held = guard.lock().await;
            self.resolve_unguarded(&symbol, max_age).await
        };

        // Drop the per-symbol lock once nobody else is waiting on it.
        let mut map = in_flight.lock().await;
        let idle = map
            .get(&symbol)
            .is_some_and(|current| Arc::ptr_eq(current, &guard) && Arc::strong_count(&guard) == 2);
        if idle {
            map.remove(&symbol);
        }
        result
    }

    async fn resolve_unguarded(
        &self,
        symbol: &str,
        max_age: Duration,
    ) -> Result<(Snapshot, Origin), MarketDataError> {
        match self.store.get(symbol).await {
            Ok(Some(entry)) if entry.is_fresh(Utc::now(), max_age) => {
                debug!("Serving {symbol} from CACHE (stored at {})", entry.stored_at);
                return Ok((entry.snapshot, Origin::Cache));
            }
            Ok(Some(entry)) => {
                debug!("Cache for {symbol} is STALE (stored at {})", entry.stored_at);
            }
            Ok(None) => debug!("No cache entry for {symbol}"),
            Err(e) => warn!("Cache read failed for {symbol}, treating as miss: {e:#}"),
        }

        let snapshot = self.fetcher.fetch(symbol).await?;

        if let Err(e) = self.store.put(symbol, &snapshot, Utc::now()).await {
            warn!("Cache write failed for {symbol}: {e:#}");
        } else {
            info!("Saved fresh snapshot for {symbol}");
        }
        Ok((snapshot, Origin::Live))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::CacheEntry;
    use crate::store::memory::MemorySnapshotStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::DateTime;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn snapshot(price: f64) -> Snapshot {
        Snapshot {
            info: json!({"shortName": "Acme", "regularMarketPrice": price})
                .as_object()
                .cloned()
                .unwrap(),
            history: vec![],
            events: None,
        }
    }

    struct MockFetcher {
        call_count: AtomicUsize,
        outcome: Result<f64, MarketDataError>,
        delay: Duration,
    }

    impl MockFetcher {
        fn returning(outcome: Result<f64, MarketDataError>) -> Arc<Self> {
            Arc::new(Self {
                call_count: AtomicUsize::new(0),
                outcome,
                delay: Duration::ZERO,
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SnapshotFetcher for MockFetcher {
        async fn fetch(&self, _symbol: &str) -> Result<Snapshot, MarketDataError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcome.clone().map(snapshot)
        }
    }

    struct CountingStore {
        inner: MemorySnapshotStore,
        puts: AtomicUsize,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl CountingStore {
        fn new(fail_reads: bool) -> Arc<Self> {
            Arc::new(Self {
                inner: MemorySnapshotStore::new(),
                puts: AtomicUsize::new(0),
                fail_reads,
                fail_writes: false,
            })
        }

        fn failing_writes() -> Arc<Self> {
            Arc::new(Self {
                inner: MemorySnapshotStore::new(),
                puts: AtomicUsize::new(0),
                fail_reads: false,
                fail_writes: true,
            })
        }
    }

    #[async_trait]
    impl SnapshotStore for CountingStore {
        async fn get(&self, symbol: &str) -> anyhow::Result<Option<CacheEntry>> {
            if self.fail_reads {
                return Err(anyhow!("disk on fire"));
            }
            self.inner.get(symbol).await
        }

        async fn put(
            &self,
            symbol: &str,
            snapshot: &Snapshot,
            stored_at: DateTime<Utc>,
        ) -> anyhow::Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(anyhow!("disk full"));
            }
            self.inner.put(symbol, snapshot, stored_at).await
        }
    }

    #[tokio::test]
    async fn test_second_resolve_within_window_is_cached() {
        let store = CountingStore::new(false);
        let fetcher = MockFetcher::returning(Ok(5.0));
        let resolver = SnapshotResolver::new(store.clone(), fetcher.clone());

        let (first, origin) = resolver.resolve("aaa", DAY).await.unwrap();
        assert_eq!(origin, Origin::Live);

        let (second, origin) = resolver.resolve("AAA", DAY).await.unwrap();
        assert_eq!(origin, Origin::Cache);
        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_max_age_forces_refresh() {
        let store = CountingStore::new(false);
        let fetcher = MockFetcher::returning(Ok(5.0));
        let resolver = SnapshotResolver::new(store.clone(), fetcher.clone());

        for _ in 0..3 {
            let (_, origin) = resolver.resolve("AAA", Duration::ZERO).await.unwrap();
            assert_eq!(origin, Origin::Live);
        }
        assert_eq!(fetcher.calls(), 3);
        assert_eq!(store.puts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stale_entry_is_refreshed_and_overwritten() {
        let store = CountingStore::new(false);
        store
            .inner
            .put("AAA", &snapshot(1.0), Utc::now() - chrono::Duration::hours(30))
            .await
            .unwrap();
        let fetcher = MockFetcher::returning(Ok(2.0));
        let resolver = SnapshotResolver::new(store.clone(), fetcher.clone());

        let (fresh, origin) = resolver.resolve("AAA", DAY).await.unwrap();
        assert_eq!(origin, Origin::Live);
        assert_eq!(fresh.current_price(), Some(2.0));

        let stored = store.inner.get("AAA").await.unwrap().unwrap();
        assert_eq!(stored.snapshot.current_price(), Some(2.0));
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_fall_back_to_stale_entry() {
        let store = CountingStore::new(false);
        store
            .inner
            .put("AAA", &snapshot(1.0), Utc::now() - chrono::Duration::hours(30))
            .await
            .unwrap();
        let fetcher = MockFetcher::returning(Err(MarketDataError::unavailable("AAA", "timeout")));
        let resolver = SnapshotResolver::new(store.clone(), fetcher.clone());

        let result = resolver.resolve("AAA", DAY).await;
        assert!(matches!(
            result,
            Err(MarketDataError::FetchUnavailable { .. })
        ));
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_symbol_not_found_is_propagated_without_retry() {
        let store = CountingStore::new(false);
        let fetcher =
            MockFetcher::returning(Err(MarketDataError::SymbolNotFound("NOPE".to_string())));
        let resolver = SnapshotResolver::new(store.clone(), fetcher.clone());

        let result = resolver.resolve("NOPE", DAY).await;
        assert_eq!(
            result.unwrap_err(),
            MarketDataError::SymbolNotFound("NOPE".to_string())
        );
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_symbol_is_rejected() {
        let fetcher = MockFetcher::returning(Ok(1.0));
        let resolver = SnapshotResolver::new(CountingStore::new(false), fetcher.clone());

        assert!(matches!(
            resolver.resolve("  ", DAY).await,
            Err(MarketDataError::InvalidSymbol(_))
        ));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_store_read_failure_is_a_miss() {
        let store = CountingStore::new(true);
        let fetcher = MockFetcher::returning(Ok(3.0));
        let resolver = SnapshotResolver::new(store.clone(), fetcher.clone());

        let (_, origin) = resolver.resolve("AAA", DAY).await.unwrap();
        assert_eq!(origin, Origin::Live);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_store_write_failure_still_returns_live() {
        let store = CountingStore::failing_writes();
        let fetcher = MockFetcher::returning(Ok(3.0));
        let resolver = SnapshotResolver::new(store.clone(), fetcher.clone());

        let (snapshot, origin) = resolver.resolve("AAA", DAY).await.unwrap();
        assert_eq!(origin, Origin::Live);
        assert_eq!(snapshot.current_price(), Some(3.0));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
        assert!(store.inner.get("AAA").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_flight_coalesces_concurrent_misses() {
        let store = CountingStore::new(false);
        let fetcher = Arc::new(MockFetcher {
            call_count: AtomicUsize::new(0),
            outcome: Ok(4.0),
            delay: Duration::from_millis(20),
        });
        let resolver = Arc::new(
            SnapshotResolver::new(store.clone(), fetcher.clone()).with_single_flight(true),
        );

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve("AAA", DAY).await })
            })
            .collect();

        let mut origins = Vec::new();
        for task in tasks {
            let (_, origin) = task.await.unwrap().unwrap();
            origins.push(origin);
        }

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(origins.iter().filter(|o| **o == Origin::Live).count(), 1);
        assert!(resolver.in_flight.as_ref().unwrap().lock().await.is_empty());
    }
}
