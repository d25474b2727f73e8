//! This crate is a content similarity engine: "records related to this one"
//! by Pearson correlation of raw term-count vectors.

pub mod config;
pub mod error;
pub mod utils;
pub mod dataset;
pub mod vectorizer;
pub mod cache;
pub mod related;

use std::{fmt::Debug, hash::Hash};

use serde::{de::DeserializeOwned, Serialize};

/// Record Key
/// Anything usable as a record identifier: hashable and totally ordered
/// (rankings break ties by id), shareable across threads and storable in a
/// cache blob.
pub trait RecordKey:
    Clone + Eq + Hash + Ord + Debug + Send + Sync + Serialize + DeserializeOwned
{
}

impl<T> RecordKey for T where
    T: Clone + Eq + Hash + Ord + Debug + Send + Sync + Serialize + DeserializeOwned
{
}

/// Related Records
/// The top-level struct of this crate, answering "the N records most similar
/// to X".
///
/// It wires together:
/// - a `RecordSource` the records are pulled from
/// - a `DatasetBuilder` normalizing each record into a token bag
/// - a `VectorCache` memoizing the vector space of the dataset
/// - a `SimilarityEngine` ranking records by Pearson correlation
///
/// `RelatedRecords<K, S>` has the following generic parameters:
/// - `K`: Record key type (e.g., u64, String)
/// - `S`: Record source type (e.g., `MemorySource<K>`, `JsonLinesSource`)
///
/// # Thread Safety
/// Queries take `&self` and may run concurrently from multiple threads.
pub use related::RelatedRecords;

/// Vector Space
/// The vocabulary and the vector table of a dataset, computed together.
/// - vocabulary: every term appearing in more than one record, sorted
/// - vector table: record id -> raw term counts over the vocabulary
///
/// # Serialization
/// Supported. The cache stores it as a CBOR blob and checks its fingerprint
/// when reading it back.
pub use vectorizer::{VectorSpace, VectorTable, Vocabulary};

/// Corpus for the Vector Space
/// Counts the number of records each term appears in.
/// It does not store record text or ids.
///
/// # Thread Safety
/// This struct is thread-safe and can be filled concurrently from multiple threads.
/// Implemented using DashMap and atomics.
pub use vectorizer::corpus::Corpus;

/// Term Frequency structure
/// Raw occurrence count of every term of a single record.
pub use vectorizer::term::TermFrequency;

/// Comparison Trait
/// Defines the correlation used to score a pair of vectors.
/// `DefaultCompare` computes the Pearson coefficient and reports a zero
/// variance pair as undefined.
pub use vectorizer::compare::{Compare, DefaultCompare};

/// Similarity Engine and Ranking
/// - `SimilarityEngine`: ranks every other record against a target record
/// - `SimilarityRanking`: (record id, score) pairs, best first, plus the
///   number of skipped degenerate pairs
pub use vectorizer::evaluate::scoring::{SimilarityEngine, SimilarityRanking};

/// Text Normalizer
/// Strips markup tags, stop words and punctuation, then lower-cases.
pub use utils::normalizer::TextNormalizer;

/// Dataset construction
/// - `RecordSource`: backing store of the records
/// - `DatasetBuilder`: record source -> normalized token bags
pub use dataset::{Dataset, DatasetBuilder, FieldValue, Record, RecordSource};

/// Bundled record sources
pub use dataset::{jsonl::JsonLinesSource, memory::MemorySource};

/// Cache Backends
/// - `CacheBackend`: opaque string -> blob store
/// - `MemoryCache`: in-process backend with optional expiry
/// - `CacheRegistry`: backends by name
/// - `VectorCache`: vector space memo with dedicated -> default fallback
pub use cache::{vector::{CacheStats, VectorCache}, CacheBackend, CacheRegistry, MemoryCache};

/// Configuration
pub use config::SimilarityConfig;

/// Errors
pub use error::{CacheError, ConfigError, Result, SimilarityError};
