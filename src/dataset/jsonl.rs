use std::{fs::File, io::{BufRead, BufReader}, path::{Path, PathBuf}};

use serde_json::{Map, Value};

use crate::{dataset::{FieldValue, Record, RecordSource}, error::{Result, SimilarityError}};

/// Record source over a JSON-lines file, one object per line.
///
/// The id is read from `id_field` (string or number). Blank lines are
/// skipped. The file is re-read on every fetch so a dataset is always a fresh
/// snapshot.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
    id_field: String,
    name: String,
}

impl JsonLinesSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();
        Self {
            path,
            id_field: "id".to_string(),
            name,
        }
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    fn record_id(&self, line_no: usize, object: &Map<String, Value>) -> Result<String> {
        match object.get(&self.id_field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(other) => Err(self.unavailable(format!(
                "line {line_no}: id field '{}' must be a string or number, got {other}",
                self.id_field
            ))),
            None => Err(self.unavailable(format!(
                "line {line_no}: missing id field '{}'",
                self.id_field
            ))),
        }
    }

    fn unavailable(&self, reason: impl ToString) -> SimilarityError {
        SimilarityError::source_unavailable(&self.name, reason)
    }
}

impl RecordSource<String> for JsonLinesSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, fields: &[String], limit: Option<usize>) -> Result<Vec<Record<String>>> {
        let file = File::open(&self.path).map_err(|e| self.unavailable(e))?;
        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            if limit.is_some_and(|l| records.len() >= l) {
                break;
            }
            let line_no = idx + 1;
            let line = line.map_err(|e| self.unavailable(e))?;
            if line.trim().is_empty() {
                continue;
            }
            let object = match serde_json::from_str::<Value>(&line) {
                Ok(Value::Object(object)) => object,
                Ok(_) => return Err(self.unavailable(format!("line {line_no}: not a JSON object"))),
                Err(e) => return Err(self.unavailable(format!("line {line_no}: {e}"))),
            };
            let id = self.record_id(line_no, &object)?;
            let values = fields
                .iter()
                .map(|f| object.get(f).cloned().map_or(FieldValue::Null, FieldValue::from))
                .collect();
            records.push(Record::new(id, values));
        }
        Ok(records)
    }
}
