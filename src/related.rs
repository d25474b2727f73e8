//! The "similar records" operation.
//!
//! dataset -> vector space (through the vector cache) -> ranking -> first N ids

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::RandomState;
use dashmap::DashMap;
use tracing::debug;

use crate::{
    cache::{vector::VectorCache, CacheRegistry},
    config::SimilarityConfig,
    dataset::{DatasetBuilder, RecordSource},
    error::Result,
    vectorizer::{evaluate::scoring::{SimilarityEngine, SimilarityRanking}, VectorSpace},
    RecordKey,
};

/// RelatedRecords
/// Answers "the N records most similar to X" over a record source.
///
/// Every known query id's full ranking is memoized for the vector space it was
/// computed from (by fingerprint). A different space, a refresh or a flush
/// drops the memo wholesale.
#[derive(Debug)]
pub struct RelatedRecords<K, S>
where
    K: RecordKey,
{
    source: S,
    builder: DatasetBuilder,
    cache: VectorCache<K>,
    engine: SimilarityEngine,
    vectors_key: String,
    memo: DashMap<(u64, K), Vec<K>, RandomState>,
    memo_fingerprint: AtomicU64,
}

impl<K, S> RelatedRecords<K, S>
where
    K: RecordKey,
    S: RecordSource<K> + Sync,
{
    /// Validate `config` and resolve its cache backends from `registry`
    pub fn new(config: &SimilarityConfig, source: S, registry: &CacheRegistry) -> Result<Self> {
        config.validate()?;
        let cache = VectorCache::from_config(registry, config)?;
        Ok(Self::with_cache(config, source, cache))
    }

    /// Use an already resolved vector cache
    pub fn with_cache(config: &SimilarityConfig, source: S, cache: VectorCache<K>) -> Self {
        Self {
            source,
            builder: DatasetBuilder::from_config(config),
            cache,
            engine: SimilarityEngine::new(),
            vectors_key: config.vectors_key(),
            memo: DashMap::with_hasher(RandomState::new()),
            memo_fingerprint: AtomicU64::new(0),
        }
    }

    /// Up to `n` ids most similar to `id`, best first, `id` excluded.
    /// An id unknown to the vector space gives an empty list.
    /// `force_refresh` rebuilds the vector space before answering.
    pub fn similar(&self, id: &K, n: usize, force_refresh: bool) -> Result<Vec<K>> {
        let space = self.current_space(force_refresh)?;
        if !space.contains(id) {
            debug!(id = ?id, "unknown record, no related ids");
            return Ok(Vec::new());
        }
        let memo_key = (space.fingerprint(), id.clone());
        if let Some(ids) = self.memo.get(&memo_key) {
            debug!(id = ?id, "related ids served from memo");
            return Ok(ids.iter().take(n).cloned().collect());
        }
        let ids = self.engine.rank_space(id, &space).into_ids();
        let top = ids.iter().take(n).cloned().collect();
        self.memo.insert(memo_key, ids);
        Ok(top)
    }

    /// Full ranking with scores
    pub fn ranking(&self, id: &K, force_refresh: bool) -> Result<SimilarityRanking<K>> {
        let space = self.current_space(force_refresh)?;
        Ok(self.engine.rank_space(id, &space))
    }

    /// The current vector space
    pub fn space(&self) -> Result<VectorSpace<K>> {
        self.current_space(false)
    }

    /// Drop the cached vector space and every memoized ranking
    pub fn flush(&self) -> Result<()> {
        self.cache.flush(&self.vectors_key)?;
        self.memo.clear();
        Ok(())
    }

    pub fn cache(&self) -> &VectorCache<K> {
        &self.cache
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn current_space(&self, force_refresh: bool) -> Result<VectorSpace<K>> {
        let build = || -> Result<VectorSpace<K>> {
            Ok(VectorSpace::compute(&self.builder.build(&self.source)?))
        };
        let space = if force_refresh {
            self.memo.clear();
            self.cache.refresh(&self.vectors_key, build)?
        } else {
            self.cache.get_or_compute(&self.vectors_key, build)?
        };
        let fingerprint = space.fingerprint();
        if self.memo_fingerprint.swap(fingerprint, Ordering::AcqRel) != fingerprint {
            // rankings of other spaces can never be hit again
            self.memo.retain(|(fp, _), _| *fp == fingerprint);
        }
        Ok(space)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicUsize, Arc};

    use super::*;
    use crate::{
        cache::MemoryCache,
        dataset::{memory::MemorySource, Record},
        error::SimilarityError,
    };

    /// memory source counting fetches, optionally down
    struct CountingSource {
        inner: MemorySource<u32>,
        fetches: AtomicUsize,
        down: bool,
    }

    impl RecordSource<u32> for CountingSource {
        fn name(&self) -> &str {
            "entries"
        }

        fn fetch(&self, fields: &[String], limit: Option<usize>) -> Result<Vec<Record<u32>>> {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            if self.down {
                return Err(SimilarityError::source_unavailable("entries", "connection refused"));
            }
            self.inner.fetch(fields, limit)
        }
    }

    fn entries() -> MemorySource<u32> {
        MemorySource::new("entries")
            .with_record(1, [("title", "Cats"), ("content", "<p>The cat sat with the dog.</p>")])
            .with_record(2, [("title", "Dogs"), ("content", "A dog, a dog and a bird!")])
            .with_record(3, [("title", "Birds"), ("content", "cat and bird")])
            .with_record(4, [("title", "Cats again"), ("content", "cat cat cat dog")])
    }

    fn config() -> SimilarityConfig {
        SimilarityConfig::default()
            .with_fields(["title", "content"])
            .with_record_limit(None)
    }

    fn service(down: bool) -> RelatedRecords<u32, CountingSource> {
        let source = CountingSource { inner: entries(), fetches: AtomicUsize::new(0), down };
        RelatedRecords::new(&config(), source, &CacheRegistry::with_memory("default")).unwrap()
    }

    #[test]
    fn similar_excludes_query_and_truncates() {
        let related = service(false);
        let all = related.similar(&1, 10, false).unwrap();
        assert!(!all.contains(&1));
        assert_eq!(all.len() + related.ranking(&1, false).unwrap().skipped, 3);
        let top = related.similar(&1, 1, false).unwrap();
        assert_eq!(top, all[..1].to_vec());
        assert!(related.similar(&1, 0, false).unwrap().is_empty());
    }

    #[test]
    fn most_similar_record_comes_first() {
        let related = service(false);
        // "a" occurs in record 2 only and stays out of the vocabulary
        let space = related.space().unwrap();
        let vocab: Vec<&str> = space.vocabulary().iter().map(|t| t.as_ref()).collect();
        assert_eq!(vocab, vec!["bird", "cat", "cats", "dog"]);
        assert_eq!(related.similar(&1, 3, false).unwrap(), vec![4, 2, 3]);
    }

    #[test]
    fn unknown_id_is_empty_not_an_error() {
        let related = service(false);
        assert!(related.similar(&99, 5, false).unwrap().is_empty());
    }

    #[test]
    fn unknown_ids_are_not_memoized() {
        let related = service(false);
        for id in 100..1100 {
            assert!(related.similar(&id, 5, false).unwrap().is_empty());
        }
        assert!(related.memo.is_empty());
        related.similar(&1, 5, false).unwrap();
        assert_eq!(related.memo.len(), 1);
    }

    #[test]
    fn source_is_queried_once_until_refresh_or_flush() {
        let related = service(false);
        related.similar(&1, 3, false).unwrap();
        related.similar(&2, 3, false).unwrap();
        assert_eq!(related.source().fetches.load(Ordering::Relaxed), 1);

        related.similar(&1, 3, true).unwrap();
        assert_eq!(related.source().fetches.load(Ordering::Relaxed), 2);

        related.flush().unwrap();
        related.similar(&1, 3, false).unwrap();
        assert_eq!(related.source().fetches.load(Ordering::Relaxed), 3);
        assert_eq!(related.cache().stats().hits(), 1);
        assert!(related.cache().is_fallback());
    }

    #[test]
    fn source_failure_propagates() {
        let related = service(true);
        let err = related.similar(&1, 3, false).unwrap_err();
        assert!(matches!(err, SimilarityError::SourceUnavailable { .. }));
    }

    #[test]
    fn memo_follows_the_shared_cache() {
        let backend = Arc::new(MemoryCache::new("comparison"));
        let registry = CacheRegistry::new()
            .with_backend("comparison", backend.clone())
            .with_backend("default", Arc::new(MemoryCache::new("default")));
        let related = RelatedRecords::new(&config(), entries(), &registry).unwrap();
        let before = related.similar(&1, 3, false).unwrap();

        // another process replaces the cached space with a smaller one
        let replaced = RelatedRecords::new(
            &config(),
            MemorySource::new("entries")
                .with_record(1u32, [("title", "x x y"), ("content", "")])
                .with_record(5, [("title", "x x x"), ("content", "y")]),
            &registry,
        )
        .unwrap();
        replaced.similar(&1, 3, true).unwrap();

        let after = related.similar(&1, 3, false).unwrap();
        assert_ne!(before, after);
        assert_eq!(after, vec![5]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let source = MemorySource::<u32>::new("entries");
        let err = RelatedRecords::new(
            &config().with_fields(Vec::<String>::new()),
            source,
            &CacheRegistry::with_memory("default"),
        )
        .unwrap_err();
        assert!(matches!(err, SimilarityError::Config(_)));
    }
}
