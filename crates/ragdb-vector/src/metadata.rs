//! Metadata artifact: the records paired with an index, id `i` at position `i`.
//!
//! Accepted JSON shapes are a bare list of objects or an object holding a
//! `"profiles"` list. Text is taken from `text`, `page_content` or
//! `definition` (first present), the source identifier from `source` or
//! `source_file`; every other key is kept as a provenance field.

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use ragdb_core::types::Record;

const TEXT_KEYS: [&str; 3] = ["text", "page_content", "definition"];

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata must be a JSON list or an object with a \"profiles\" list")]
    Shape,
    #[error("record {0} is not a JSON object")]
    NotAnObject(usize),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    records: Vec<Arc<Record>>,
}

impl MetadataStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records: records.into_iter().map(Arc::new).collect() }
    }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn get(&self, id: u64) -> Option<&Arc<Record>> {
        usize::try_from(id).ok().and_then(|i| self.records.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Arc<Record>)> {
        self.records.iter().enumerate().map(|(i, r)| (i as u64, r))
    }

    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let raw = fs::read_to_string(path)?;
        // Tolerate a UTF-8 BOM from hand-edited files.
        let value: Value = serde_json::from_str(raw.trim_start_matches('\u{feff}'))?;
        Self::from_json(value)
    }

    pub fn from_json(value: Value) -> Result<Self, MetadataError> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("profiles") {
                Some(Value::Array(items)) => items,
                _ => return Err(MetadataError::Shape),
            },
            _ => return Err(MetadataError::Shape),
        };
        let records = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(obj) => Ok(record_from_object(obj)),
                _ => Err(MetadataError::NotAnObject(i)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(records))
    }

    /// Write as a JSON list in id order.
    pub fn write(&self, path: &Path) -> Result<(), MetadataError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let records: Vec<&Record> = self.records.iter().map(|r| r.as_ref()).collect();
        fs::write(path, serde_json::to_string_pretty(&records)?)?;
        Ok(())
    }
}

fn record_from_object(mut obj: Map<String, Value>) -> Record {
    let text = TEXT_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default();
    // Only a string `definition` survives as a provenance field, so no key
    // can collide with `text` when the record is written back.
    for key in TEXT_KEYS {
        if key != "definition" || !obj.get(key).is_some_and(Value::is_string) {
            obj.remove(key);
        }
    }
    let source = match obj.remove("source") {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        Some(other) if !other.is_null() => other.to_string(),
        _ => obj.get("source_file").and_then(Value::as_str).unwrap_or_default().to_string(),
    };
    Record { text, source, fields: obj.into_iter().collect() }
}
