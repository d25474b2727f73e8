pub mod corpus;
pub mod term;
pub mod serde;
pub mod compare;
pub mod evaluate;

use indexmap::IndexMap;
use rayon::prelude::*;
use ::serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{dataset::Dataset, vectorizer::{corpus::Corpus, term::TermFrequency}, RecordKey};

/// Ordered vector dimensions, sorted lexicographically
pub type Vocabulary = Vec<Box<str>>;

/// Record id -> raw term counts over the vocabulary, ordered by record id
pub type VectorTable<K> = IndexMap<K, Vec<u32>>;

/// xxh64 seed of the fingerprint, part of the cache blob format
const FINGERPRINT_SEED: u64 = 0x7265_6c61_7465_6421;

/// VectorSpace
/// The vocabulary and the vector table of a dataset, always built and
/// replaced together because vector slots are positional over the vocabulary.
///
/// - the vocabulary holds every term found in more than one record, sorted
/// - every record gets a vector of `vocabulary().len()` raw term counts
///
/// Building is deterministic: the same dataset always yields an identical
/// space, fingerprint included. The fingerprint is the xxh64 of the CBOR
/// encoding of vocabulary and table, so it is the same for every build and
/// target sharing a cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct VectorSpace<K>
where
    K: RecordKey,
{
    vocabulary: Vocabulary,
    vectors: VectorTable<K>,
    fingerprint: u64,
}

impl<K> VectorSpace<K>
where
    K: RecordKey,
{
    /// Build the vector space of a dataset.
    /// An empty dataset gives an empty vocabulary and an empty table.
    pub fn compute(dataset: &Dataset<K>) -> Self {
        let entries: Vec<(&K, &String)> = dataset.iter().collect();

        // pass 1: per record counts + record frequency of every term
        let corpus = Corpus::new();
        let mut freqs: Vec<(&K, TermFrequency)> = entries
            .par_iter()
            .map(|(key, text)| {
                let tf = TermFrequency::from_text(text);
                corpus.add_set(tf.term_set_iter());
                (*key, tf)
            })
            .collect();
        let vocabulary = corpus.shared_terms();

        // pass 2: dense vectors, in record id order
        freqs.par_sort_unstable_by(|a, b| a.0.cmp(b.0));
        let rows: Vec<(K, Vec<u32>)> = freqs
            .par_iter()
            .map(|(key, tf)| {
                let vector = vocabulary.iter().map(|term| tf.term_count(term)).collect();
                ((*key).clone(), vector)
            })
            .collect();
        let vectors: VectorTable<K> = rows.into_iter().collect();

        debug!(
            records = vectors.len(),
            terms = corpus.vocab_size(),
            vocabulary = vocabulary.len(),
            "vector space computed"
        );
        Self::from_parts_unchecked(vocabulary, vectors)
    }

    fn from_parts_unchecked(vocabulary: Vocabulary, vectors: VectorTable<K>) -> Self {
        let fingerprint = Self::fingerprint_of(&vocabulary, &vectors);
        Self { vocabulary, vectors, fingerprint }
    }

    fn fingerprint_of(vocabulary: &Vocabulary, vectors: &VectorTable<K>) -> u64 {
        // a key that cannot be encoded makes `to_blob` fail as well
        let bytes = serde_cbor::to_vec(&(vocabulary, vectors)).unwrap_or_default();
        xxhash_rust::xxh64::xxh64(&bytes, FINGERPRINT_SEED)
    }

    /// Every vector has exactly one slot per vocabulary term
    pub fn is_consistent(&self) -> bool {
        let dim = self.vocabulary.len();
        self.vectors.values().all(|v| v.len() == dim)
    }

    /// The vector dimensions
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// The vector table
    pub fn vectors(&self) -> &VectorTable<K> {
        &self.vectors
    }

    /// Vector of one record
    pub fn vector(&self, key: &K) -> Option<&[u32]> {
        self.vectors.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.vectors.contains_key(key)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Vector length
    pub fn dim(&self) -> usize {
        self.vocabulary.len()
    }

    /// Content hash of vocabulary and table
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn into_parts(self) -> (Vocabulary, VectorTable<K>) {
        (self.vocabulary, self.vectors)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn dataset(rows: &[(u32, &str)]) -> Dataset<u32> {
        rows.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn three_record_scenario() {
        let space = VectorSpace::compute(&dataset(&[
            (1, "cat dog cat"),
            (2, "dog bird dog"),
            (3, "cat bird"),
        ]));
        let vocab: Vec<&str> = space.vocabulary().iter().map(|t| t.as_ref()).collect();
        assert_eq!(vocab, vec!["bird", "cat", "dog"]);
        assert_eq!(space.vector(&1), Some(&[0, 2, 1][..]));
        assert_eq!(space.vector(&2), Some(&[1, 0, 2][..]));
        assert_eq!(space.vector(&3), Some(&[1, 1, 0][..]));
        assert_eq!(space.dim(), 3);
        assert!(space.is_consistent());
    }

    #[test]
    fn single_record_terms_are_dropped() {
        // "cat" repeats, but inside one record only
        let space = VectorSpace::compute(&dataset(&[(1, "cat cat fish"), (2, "fish bird")]));
        let vocab: Vec<&str> = space.vocabulary().iter().map(|t| t.as_ref()).collect();
        assert_eq!(vocab, vec!["fish"]);
        assert_eq!(space.vector(&1), Some(&[1][..]));
    }

    #[test]
    fn empty_dataset_gives_empty_space() {
        let space = VectorSpace::compute(&Dataset::<u32>::new());
        assert!(space.is_empty());
        assert_eq!(space.dim(), 0);
        assert!(space.is_consistent());
    }

    #[test]
    fn table_is_ordered_by_record_id() {
        let space = VectorSpace::compute(&dataset(&[(9, "a b"), (2, "a"), (5, "b")]));
        let keys: Vec<u32> = space.vectors().keys().copied().collect();
        assert_eq!(keys, vec![2, 5, 9]);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = VectorSpace::compute(&dataset(&[(1, "x y z"), (2, "y z"), (3, "z x")]));
        let b = VectorSpace::compute(&dataset(&[(3, "z x"), (1, "x y z"), (2, "y z")]));
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = VectorSpace::compute(&dataset(&[(1, "x y z"), (2, "y z"), (3, "z z")]));
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn fingerprint_is_xxh64_of_the_cbor_encoding() {
        let space = VectorSpace::compute(&dataset(&[(1, "x y"), (2, "x y y")]));
        let bytes = serde_cbor::to_vec(&(space.vocabulary(), space.vectors())).unwrap();
        assert_eq!(space.fingerprint(), xxhash_rust::xxh64::xxh64(&bytes, FINGERPRINT_SEED));

        let restored: VectorSpace<u32> = serde_cbor::from_slice(&serde_cbor::to_vec(&space).unwrap()).unwrap();
        assert_eq!(restored, space);
    }

    fn corpus_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
        let word = prop::sample::select(vec!["ant", "bee", "cat", "dog", "eel", "fox", "gnu"])
            .prop_map(str::to_string);
        prop::collection::vec(prop::collection::vec(word, 0..8), 0..12)
    }

    proptest! {
        #[test]
        fn vocabulary_holds_exactly_the_shared_terms(docs in corpus_strategy()) {
            let dataset: Dataset<usize> = docs.iter().enumerate().map(|(i, d)| (i, d.join(" "))).collect();
            let space = VectorSpace::compute(&dataset);

            for word in ["ant", "bee", "cat", "dog", "eel", "fox", "gnu"] {
                let records = docs.iter().filter(|d| d.iter().any(|w| w == word)).count();
                let in_vocab = space.vocabulary().iter().any(|t| t.as_ref() == word);
                prop_assert_eq!(in_vocab, records > 1);
            }
            prop_assert!(space.vocabulary().windows(2).all(|w| w[0] < w[1]));
            prop_assert!(space.is_consistent());
            prop_assert_eq!(space.len(), docs.len());
        }

        #[test]
        fn compute_is_deterministic(docs in corpus_strategy()) {
            let dataset: Dataset<usize> = docs.iter().enumerate().map(|(i, d)| (i, d.join(" "))).collect();
            prop_assert_eq!(VectorSpace::compute(&dataset), VectorSpace::compute(&dataset));
        }
    }
}
