//! TTL cache in front of a schema provider.

use async_trait::async_trait;
use docanalyst_core::{Result, SchemaProvider, SchemaSnapshot};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Cached snapshot entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: SchemaSnapshot,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(snapshot: SchemaSnapshot, ttl: Duration) -> Self {
        Self {
            snapshot,
            created_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            (self.hits as f64) / ((self.hits + self.misses) as f64) * 100.0
        }
    }
}

/// Serves the last snapshot of `inner` until it is older than the TTL.
///
/// Concurrent misses are coalesced: only one caller fetches, the rest wait
/// for its result.
///
/// # Examples
///
/// ```rust
/// use docanalyst_core::{SchemaProvider, SchemaSnapshot};
/// use docanalyst_integrations::{CachedSchemaProvider, StaticSchemaProvider};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let inner = StaticSchemaProvider::new(
///     SchemaSnapshot::new().with_collection("customers", ["name", "city"]),
/// );
/// let cached = CachedSchemaProvider::new(inner, Duration::from_secs(300));
///
/// let schema = cached.schema().await.unwrap();
/// assert!(schema.has_field("customers", "city"));
/// cached.schema().await.unwrap();
/// assert_eq!(cached.stats().await.hits, 1);
/// # });
/// ```
#[derive(Debug)]
pub struct CachedSchemaProvider<P> {
    inner: P,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
    stats: RwLock<CacheStats>,
}

impl<P: SchemaProvider> CachedSchemaProvider<P> {
    /// Wrap `inner` with a cache of the given lifetime.
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entry: RwLock::new(None),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        *self.stats.read().await
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    async fn fresh(&self) -> Option<SchemaSnapshot> {
        self.entry
            .read()
            .await
            .as_ref()
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.snapshot.clone())
    }
}

#[async_trait]
impl<P: SchemaProvider> SchemaProvider for CachedSchemaProvider<P> {
    #[instrument(skip(self), fields(provider = self.inner.name()))]
    async fn schema(&self) -> Result<SchemaSnapshot> {
        if let Some(snapshot) = self.fresh().await {
            self.stats.write().await.hits += 1;
            debug!("Schema cache hit");
            return Ok(snapshot);
        }

        let mut entry = self.entry.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(cached) = entry.as_ref().filter(|e| !e.is_expired()) {
            self.stats.write().await.hits += 1;
            return Ok(cached.snapshot.clone());
        }

        self.stats.write().await.misses += 1;
        debug!("Schema cache miss, fetching");
        let snapshot = self.inner.schema().await?;
        *entry = Some(CacheEntry::new(snapshot.clone(), self.ttl));
        Ok(snapshot)
    }

    fn name(&self) -> &'static str {
        "CachedSchemaProvider"
    }

    async fn invalidate(&self) {
        *self.entry.write().await = None;
        self.inner.invalidate().await;
        debug!("Schema cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docanalyst_core::AnalystError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Counting {
        fetches: AtomicUsize,
        offline: bool,
    }

    #[async_trait]
    impl SchemaProvider for Counting {
        async fn schema(&self) -> Result<SchemaSnapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.offline {
                return Err(AnalystError::connectivity("store unreachable"));
            }
            Ok(SchemaSnapshot::new().with_collection("customers", ["name"]))
        }
    }

    #[tokio::test]
    async fn test_hits_within_ttl() {
        let cache = CachedSchemaProvider::new(Counting::default(), Duration::from_secs(60));

        for _ in 0..3 {
            assert!(cache.schema().await.unwrap().has_collection("customers"));
        }

        assert_eq!(cache.inner().fetches.load(Ordering::SeqCst), 1);
        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses), (2, 1));
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let cache = CachedSchemaProvider::new(Counting::default(), Duration::ZERO);

        cache.schema().await.unwrap();
        std::thread::sleep(Duration::from_millis(2));
        cache.schema().await.unwrap();

        assert_eq!(cache.inner().fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_fetch() {
        let cache = CachedSchemaProvider::new(Counting::default(), Duration::from_secs(60));

        cache.schema().await.unwrap();
        cache.invalidate().await;
        cache.schema().await.unwrap();

        assert_eq!(cache.inner().fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let offline = Counting {
            offline: true,
            ..Counting::default()
        };
        let cache = CachedSchemaProvider::new(offline, Duration::from_secs(60));

        assert!(matches!(
            cache.schema().await,
            Err(AnalystError::Connectivity { .. })
        ));
        assert!(cache.schema().await.is_err());
        assert_eq!(cache.inner().fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let cache = Arc::new(CachedSchemaProvider::new(
            Counting::default(),
            Duration::from_secs(60),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.schema().await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(cache.inner().fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats { hits: 3, misses: 1 };
        assert!((stats.hit_rate() - 75.0).abs() < f64::EPSILON);
        assert!(CacheStats::default().hit_rate().abs() < f64::EPSILON);
    }
}
