//! Vector space cache.
//!
//! A hit is served as-is: freshness is whatever the backend's own expiry
//! gives. A miss computes the space, stores it as an opaque blob and returns
//! it. Concurrent misses on the same key may compute twice; computing is
//! deterministic and the store is last-write-wins, so both results agree.

use std::{marker::PhantomData, sync::{atomic::{AtomicU64, Ordering}, Arc}};

use tracing::{debug, info, warn};

use crate::{cache::{CacheBackend, CacheRegistry}, config::SimilarityConfig, error::{CacheError, Result}, vectorizer::VectorSpace, RecordKey};

/// Cache hit/miss statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    /// spaces computed, by a miss or a refresh
    computes: AtomicU64,
    /// cached blobs that could not be decoded
    discarded: AtomicU64,
    /// dedicated backend operations retried on the default backend
    failovers: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn computes(&self) -> u64 {
        self.computes.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub fn failovers(&self) -> u64 {
        self.failovers.load(Ordering::Relaxed)
    }

    /// hits / lookups, 0.0 before the first lookup
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// VectorCache
/// Memoizes a `VectorSpace` under a key, in the dedicated backend when one
/// is configured and in the default backend otherwise.
///
/// While the dedicated backend is in use the default one stands by: any
/// dedicated get/set/delete failure is retried on it under the same key.
/// Only a failure of the default backend reaches the caller.
#[derive(Debug)]
pub struct VectorCache<K> {
    backend: Arc<dyn CacheBackend>,
    standby: Option<Arc<dyn CacheBackend>>,
    fallback: bool,
    stats: CacheStats,
    _marker: PhantomData<fn() -> K>,
}

impl<K> VectorCache<K>
where
    K: RecordKey,
{
    /// Resolve the `dedicated` backend, silently falling back to `default`.
    /// Fails only when `default` is not available either.
    pub fn resolve(registry: &CacheRegistry, dedicated: &str, default: &str) -> std::result::Result<Self, CacheError> {
        match registry.get(dedicated) {
            Ok(backend) => {
                let standby = registry
                    .get(default)
                    .ok()
                    .filter(|standby| !Arc::ptr_eq(standby, &backend));
                Ok(Self {
                    standby,
                    ..Self::with_backend(backend)
                })
            }
            Err(err) => {
                debug!(dedicated, default, error = %err, "dedicated cache unavailable, using default cache");
                let backend = registry.get(default)?;
                Ok(Self {
                    fallback: true,
                    ..Self::with_backend(backend)
                })
            }
        }
    }

    pub fn from_config(registry: &CacheRegistry, config: &SimilarityConfig) -> std::result::Result<Self, CacheError> {
        Self::resolve(registry, &config.dedicated_cache, &config.default_cache)
    }

    /// Cache over an explicit backend, without standby
    pub fn with_backend(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            standby: None,
            fallback: false,
            stats: CacheStats::default(),
            _marker: PhantomData,
        }
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Whether the default backend stands in for the dedicated one
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Cached space under `key`, or the result of `compute` stored under `key`.
    /// `compute` runs only on a miss; its error propagates and nothing is stored.
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> Result<VectorSpace<K>>
    where
        F: FnOnce() -> Result<VectorSpace<K>>,
    {
        if let Some(blob) = self.with_failover("get", key, |backend| backend.get(key))? {
            match VectorSpace::from_blob(&blob) {
                Ok(space) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key, backend = self.backend_name(), "vector cache hit");
                    return Ok(space);
                }
                Err(err) => {
                    self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                    warn!(key, backend = self.backend_name(), error = %err, "discarding undecodable cached vector space");
                }
            }
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key, backend = self.backend_name(), "vector cache miss");
        self.compute_and_store(key, compute)
    }

    /// Recompute regardless of the cached value and overwrite it
    pub fn refresh<F>(&self, key: &str, compute: F) -> Result<VectorSpace<K>>
    where
        F: FnOnce() -> Result<VectorSpace<K>>,
    {
        debug!(key, backend = self.backend_name(), "vector cache refresh");
        self.compute_and_store(key, compute)
    }

    /// Drop the cached value, standby copy included; the next lookup recomputes
    pub fn flush(&self, key: &str) -> Result<()> {
        self.with_failover("delete", key, |backend| backend.delete(key))?;
        if let Some(standby) = &self.standby {
            standby.delete(key)?;
        }
        debug!(key, backend = self.backend_name(), "vector cache flushed");
        Ok(())
    }

    fn compute_and_store<F>(&self, key: &str, compute: F) -> Result<VectorSpace<K>>
    where
        F: FnOnce() -> Result<VectorSpace<K>>,
    {
        let space = compute()?;
        self.stats.computes.fetch_add(1, Ordering::Relaxed);
        info!(
            key,
            records = space.len(),
            vocabulary = space.dim(),
            "vector space rebuilt"
        );
        let blob = space.to_blob()?;
        self.with_failover("set", key, |backend| backend.set(key, blob.clone()))?;
        Ok(space)
    }

    /// Run `op` on the backend in use, then on the standby if that failed
    fn with_failover<T, F>(&self, op: &'static str, key: &str, run: F) -> std::result::Result<T, CacheError>
    where
        F: Fn(&dyn CacheBackend) -> std::result::Result<T, CacheError>,
    {
        match (run(self.backend.as_ref()), &self.standby) {
            (Ok(value), _) => Ok(value),
            (Err(err), Some(standby)) => {
                self.stats.failovers.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key,
                    op,
                    backend = self.backend_name(),
                    standby = standby.name(),
                    error = %err,
                    "dedicated cache failed, retrying on default cache"
                );
                run(standby.as_ref())
            }
            (Err(err), None) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{cache::MemoryCache, dataset::Dataset, error::SimilarityError};

    fn sample_space() -> VectorSpace<u32> {
        let dataset: Dataset<u32> = [(1, "cat dog cat"), (2, "dog bird dog"), (3, "cat bird")]
            .iter()
            .map(|(k, v)| (*k, v.to_string()))
            .collect();
        VectorSpace::compute(&dataset)
    }

    fn counting(calls: &Cell<u32>) -> impl FnOnce() -> Result<VectorSpace<u32>> + '_ {
        move || {
            calls.set(calls.get() + 1);
            Ok(sample_space())
        }
    }

    #[derive(Debug)]
    struct BrokenCache;

    impl CacheBackend for BrokenCache {
        fn name(&self) -> &str {
            "broken"
        }

        fn get(&self, _key: &str) -> std::result::Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Backend { backend: "broken".into(), reason: "down".into() })
        }

        fn set(&self, _key: &str, _value: Vec<u8>) -> std::result::Result<(), CacheError> {
            Err(CacheError::Backend { backend: "broken".into(), reason: "down".into() })
        }

        fn delete(&self, _key: &str) -> std::result::Result<(), CacheError> {
            Ok(())
        }
    }

    #[test]
    fn computes_once_then_hits() {
        let cache = VectorCache::with_backend(Arc::new(MemoryCache::new("comparison")));
        let calls = Cell::new(0);
        let first = cache.get_or_compute("related:vectors", counting(&calls)).unwrap();
        let second = cache.get_or_compute("related:vectors", counting(&calls)).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert!((cache.stats().hit_ratio() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn flush_and_refresh_recompute() {
        let cache = VectorCache::with_backend(Arc::new(MemoryCache::new("comparison")));
        let calls = Cell::new(0);
        cache.get_or_compute("k", counting(&calls)).unwrap();
        cache.flush("k").unwrap();
        cache.get_or_compute("k", counting(&calls)).unwrap();
        assert_eq!(calls.get(), 2);
        cache.refresh("k", counting(&calls)).unwrap();
        assert_eq!(calls.get(), 3);
        cache.get_or_compute("k", counting(&calls)).unwrap();
        assert_eq!(calls.get(), 3);
        assert_eq!(cache.stats().computes(), 3);
    }

    #[test]
    fn missing_dedicated_backend_falls_back_with_same_key() {
        let registry = CacheRegistry::with_memory("default");
        let cache: VectorCache<u32> = VectorCache::resolve(&registry, "comparison", "default").unwrap();
        assert!(cache.is_fallback());
        assert_eq!(cache.backend_name(), "default");

        let calls = Cell::new(0);
        cache.get_or_compute("related:vectors", counting(&calls)).unwrap();
        let stored = registry.get("default").unwrap().get("related:vectors").unwrap();
        assert!(stored.is_some());

        // a second cache over the same registry sees the stored value
        let other: VectorCache<u32> = VectorCache::resolve(&registry, "comparison", "default").unwrap();
        other.get_or_compute("related:vectors", counting(&calls)).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn dedicated_backend_is_preferred() {
        let registry = CacheRegistry::with_memory("default")
            .with_backend("comparison", Arc::new(MemoryCache::new("comparison")));
        let cache: VectorCache<u32> = VectorCache::resolve(&registry, "comparison", "default").unwrap();
        assert!(!cache.is_fallback());
        cache.get_or_compute("k", || Ok(sample_space())).unwrap();
        assert!(registry.get("default").unwrap().get("k").unwrap().is_none());
        assert!(registry.get("comparison").unwrap().get("k").unwrap().is_some());
    }

    #[test]
    fn failing_dedicated_backend_retries_on_default() {
        let default = Arc::new(MemoryCache::new("default"));
        let registry = CacheRegistry::new()
            .with_backend("comparison", Arc::new(BrokenCache))
            .with_backend("default", default.clone());
        let cache: VectorCache<u32> = VectorCache::resolve(&registry, "comparison", "default").unwrap();
        assert!(!cache.is_fallback());
        assert_eq!(cache.backend_name(), "broken");

        let calls = Cell::new(0);
        let first = cache.get_or_compute("related:vectors", counting(&calls)).unwrap();
        let second = cache.get_or_compute("related:vectors", counting(&calls)).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
        assert!(default.get("related:vectors").unwrap().is_some());
        // get + set of the miss, get of the hit
        assert_eq!(cache.stats().failovers(), 3);

        cache.flush("related:vectors").unwrap();
        assert!(default.is_empty());
    }

    #[test]
    fn no_default_backend_is_an_error() {
        let registry = CacheRegistry::new();
        let err = VectorCache::<u32>::resolve(&registry, "comparison", "default").unwrap_err();
        assert_eq!(err, CacheError::InvalidBackend("default".to_string()));
    }

    #[test]
    fn default_backend_failure_propagates() {
        let cache: VectorCache<u32> = VectorCache::with_backend(Arc::new(BrokenCache));
        let err = cache.get_or_compute("k", || Ok(sample_space())).unwrap_err();
        assert!(matches!(err, SimilarityError::Cache(CacheError::Backend { .. })));
    }

    #[test]
    fn compute_failure_stores_nothing() {
        let backend = Arc::new(MemoryCache::new("default"));
        let cache: VectorCache<u32> = VectorCache::with_backend(backend.clone());
        let err = cache
            .get_or_compute("k", || Err(SimilarityError::source_unavailable("entries", "down")))
            .unwrap_err();
        assert!(matches!(err, SimilarityError::SourceUnavailable { .. }));
        assert!(backend.is_empty());
    }

    #[test]
    fn undecodable_blob_counts_as_miss() {
        let backend = Arc::new(MemoryCache::new("default"));
        backend.set("k", b"garbage".to_vec()).unwrap();
        let cache: VectorCache<u32> = VectorCache::with_backend(backend.clone());
        let calls = Cell::new(0);
        let space = cache.get_or_compute("k", counting(&calls)).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.stats().discarded(), 1);
        assert_eq!(space, sample_space());
        assert!(VectorSpace::<u32>::from_blob(&backend.get("k").unwrap().unwrap()).is_ok());
    }
}
