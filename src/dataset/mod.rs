pub mod memory;
pub mod jsonl;

use std::fmt::{self, Display};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{config::SimilarityConfig, error::{Result, SimilarityError}, utils::normalizer::TextNormalizer, RecordKey};

/// Token bag per record: record id -> normalized text
pub type Dataset<K> = IndexMap<K, String>;

/// A single field value as returned by a record source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    /// integers above `i64::MAX`
    Unsigned(u64),
    Float(f64),
    Bool(bool),
    /// absent value, coerces to the empty string
    Null,
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Unsigned(u) => write!(f, "{u}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Null => Ok(()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(FieldValue::Unsigned(value), FieldValue::Integer)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => FieldValue::Integer(i),
                (None, Some(u)) => FieldValue::Unsigned(u),
                (None, None) => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::Text(s),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

/// A record projected to its id and the requested fields.
/// `values` follows the order of the requested field names.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<K> {
    pub id: K,
    pub values: Vec<FieldValue>,
}

impl<K> Record<K> {
    pub fn new(id: K, values: Vec<FieldValue>) -> Self {
        Self { id, values }
    }

    /// Field values joined by a single space
    pub fn joined_text(&self) -> String {
        self.values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Backing store of the records to compare.
///
/// Implementations project every record to its id plus `fields` (in that
/// order) and return at most `limit` records. Stable ordering is not required.
pub trait RecordSource<K> {
    /// Name used in errors and logs
    fn name(&self) -> &str;

    /// Fetch up to `limit` records, all of them when `limit` is `None`.
    /// Fails with `SimilarityError::SourceUnavailable` when the store cannot be queried.
    fn fetch(&self, fields: &[String], limit: Option<usize>) -> Result<Vec<Record<K>>>;
}

impl<K, S> RecordSource<K> for &S
where
    S: RecordSource<K> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, fields: &[String], limit: Option<usize>) -> Result<Vec<Record<K>>> {
        (**self).fetch(fields, limit)
    }
}

/// DatasetBuilder
/// Pulls records from a source and normalizes each into a token bag.
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    fields: Vec<String>,
    limit: Option<usize>,
    normalizer: TextNormalizer,
}

impl DatasetBuilder {
    pub fn new(fields: Vec<String>, limit: Option<usize>, normalizer: TextNormalizer) -> Self {
        Self { fields, limit, normalizer }
    }

    pub fn from_config(config: &SimilarityConfig) -> Self {
        Self::new(
            config.fields.clone(),
            config.record_limit,
            TextNormalizer::new(&config.stop_words),
        )
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Build the dataset.
    /// Source failures propagate as they are, nothing is retried and no
    /// partial dataset is returned.
    pub fn build<K, S>(&self, source: &S) -> Result<Dataset<K>>
    where
        K: RecordKey,
        S: RecordSource<K> + ?Sized,
    {
        let mut records = source.fetch(&self.fields, self.limit)?;
        if let Some(limit) = self.limit {
            records.truncate(limit);
        }
        if let Some(bad) = records.iter().find(|r| r.values.len() != self.fields.len()) {
            return Err(SimilarityError::source_unavailable(
                source.name(),
                format!(
                    "record {:?} returned {} values for {} fields",
                    bad.id,
                    bad.values.len(),
                    self.fields.len()
                ),
            ));
        }

        let bags: Vec<(K, String)> = records
            .into_par_iter()
            .map(|record| {
                let text = self.normalizer.normalize(&record.joined_text());
                (record.id, text)
            })
            .collect();

        // a repeated id keeps its last occurrence
        let dataset: Dataset<K> = bags.into_iter().collect();
        debug!(source = source.name(), records = dataset.len(), "dataset built");
        Ok(dataset)
    }
}
