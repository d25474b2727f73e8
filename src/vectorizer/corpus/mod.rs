use std::sync::atomic::{AtomicU64, Ordering};

use ahash::RandomState;
use dashmap::DashMap;

/// Corpus
/// Record frequency of every term: in how many records it appears.
/// Filled concurrently, one `add_set` per record.
#[derive(Debug, Default)]
pub struct Corpus {
    records: AtomicU64,
    record_freq: DashMap<Box<str>, u64, RandomState>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record's distinct terms.
    /// Each term must appear at most once in `terms`.
    pub fn add_set<I, T>(&self, terms: I)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.records.fetch_add(1, Ordering::Relaxed);
        for term in terms {
            *self.record_freq.entry(term.as_ref().into()).or_insert(0) += 1;
        }
    }

    /// Number of records added
    pub fn record_count(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    /// Number of records containing `term`
    pub fn record_freq(&self, term: &str) -> u64 {
        self.record_freq.get(term).map_or(0, |count| *count)
    }

    /// Number of distinct terms seen
    #[inline]
    pub fn vocab_size(&self) -> usize {
        self.record_freq.len()
    }

    /// Terms found in more than one record, sorted
    pub fn shared_terms(&self) -> Vec<Box<str>> {
        let mut terms: Vec<Box<str>> = self
            .record_freq
            .iter()
            .filter(|entry| *entry.value() > 1)
            .map(|entry| entry.key().clone())
            .collect();
        terms.sort_unstable();
        terms
    }
}
