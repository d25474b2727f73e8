use indexmap::IndexMap;

use crate::{dataset::{FieldValue, Record, RecordSource}, error::Result};

/// In-process record source.
/// Records are returned in insertion order, a missing field projects to `Null`.
#[derive(Debug, Clone)]
pub struct MemorySource<K> {
    name: String,
    rows: Vec<(K, IndexMap<String, FieldValue>)>,
}

impl<K> MemorySource<K>
where
    K: Clone,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// Append a record
    pub fn push<I, F, V>(&mut self, id: K, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<String>,
        V: Into<FieldValue>,
    {
        let row = fields
            .into_iter()
            .map(|(f, v)| (f.into(), v.into()))
            .collect();
        self.rows.push((id, row));
        self
    }

    /// Builder flavour of `push`
    pub fn with_record<I, F, V>(mut self, id: K, fields: I) -> Self
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<String>,
        V: Into<FieldValue>,
    {
        self.push(id, fields);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<K> RecordSource<K> for MemorySource<K>
where
    K: Clone,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, fields: &[String], limit: Option<usize>) -> Result<Vec<Record<K>>> {
        let take = limit.unwrap_or(self.rows.len());
        Ok(self
            .rows
            .iter()
            .take(take)
            .map(|(id, row)| {
                let values = fields
                    .iter()
                    .map(|f| row.get(f).cloned().unwrap_or(FieldValue::Null))
                    .collect();
                Record::new(id.clone(), values)
            })
            .collect())
    }
}
