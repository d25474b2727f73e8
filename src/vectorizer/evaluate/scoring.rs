use std::{cmp::Ordering, fmt::Debug, marker::PhantomData};

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::{vectorizer::{compare::{Compare, DefaultCompare}, VectorSpace, VectorTable}, RecordKey};

/// Structure to store ranked results
pub struct SimilarityRanking<K> {
    /// (Record ID, Score), best first
    pub list: Vec<(K, f64)>,
    /// candidates left out because their correlation is undefined
    pub skipped: usize,
}

impl<K> SimilarityRanking<K> {
    /// Create a new ranking, sorted
    pub fn new(list: Vec<(K, f64)>, skipped: usize) -> Self
    where
        K: Ord,
    {
        let mut ranking = SimilarityRanking { list, skipped };
        ranking.sort_by_score();
        ranking
    }

    /// Ranking of nothing
    pub fn empty() -> Self {
        SimilarityRanking { list: Vec::new(), skipped: 0 }
    }

    /// Sort by descending score, equal scores by ascending record id
    pub fn sort_by_score(&mut self) -> &mut Self
    where
        K: Ord,
    {
        self.list.retain(|(_, s)| !s.is_nan());
        self.list.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, f64)> {
        self.list.iter().map(|(k, s)| (k, *s))
    }

    /// Record ids, best first
    pub fn ids(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.list.iter().map(|(k, _)| k.clone()).collect()
    }

    /// The `n` best record ids
    pub fn top(&self, n: usize) -> Vec<K>
    where
        K: Clone,
    {
        self.list.iter().take(n).map(|(k, _)| k.clone()).collect()
    }

    pub fn into_ids(self) -> Vec<K> {
        self.list.into_iter().map(|(k, _)| k).collect()
    }
}

impl<K> Debug for SimilarityRanking<K>
where
    K: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            writeln!(f, "SimilarityRanking [")?;
            for (key, score) in &self.list {
                writeln!(f, "    {:?}: {:.6}", key, score)?;
            }
            write!(f, "] (skipped: {})", self.skipped)
        } else {
            f.debug_list().entries(&self.list).finish()
        }
    }
}

/// SimilarityEngine
/// Ranks every other record of a vector table by its correlation with a
/// target record. `C` is the comparison used, Pearson by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityEngine<C = DefaultCompare> {
    _marker: PhantomData<C>,
}

impl<C> SimilarityEngine<C>
where
    C: Compare<u32>,
{
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }

    /// Rank the records of `table` by similarity to `target`.
    ///
    /// - an unknown `target` gives an empty ranking
    /// - `target` itself is never part of the ranking
    /// - records with an undefined score are skipped and counted in `skipped`
    pub fn rank<K>(&self, target: &K, table: &VectorTable<K>) -> SimilarityRanking<K>
    where
        K: RecordKey,
    {
        let Some(target_vec) = table.get(target) else {
            debug!(target = ?target, "target not in vector table");
            return SimilarityRanking::empty();
        };

        let candidates: Vec<(&K, &Vec<u32>)> =
            table.iter().filter(|(key, _)| *key != target).collect();
        let scored: Vec<(&K, Option<f64>)> = candidates
            .par_iter()
            .map(|(key, vector)| (*key, C::pearson(target_vec, vector)))
            .collect();

        let mut list = Vec::with_capacity(scored.len());
        let mut skipped = 0;
        for (key, score) in scored {
            match score {
                Some(score) => list.push((key.clone(), score)),
                None => {
                    trace!(target = ?target, other = ?key, "zero variance, pair skipped");
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            debug!(target = ?target, skipped, "degenerate pairs skipped");
        }
        SimilarityRanking::new(list, skipped)
    }

    /// `rank` over the table of a vector space
    pub fn rank_space<K>(&self, target: &K, space: &VectorSpace<K>) -> SimilarityRanking<K>
    where
        K: RecordKey,
    {
        self.rank(target, space.vectors())
    }
}
