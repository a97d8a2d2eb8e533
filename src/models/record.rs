// src/models/record.rs
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::models::schema::{AUTHOR_FIELD, OTHERS_SENTINEL};
use crate::utils::error::RecordError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub given: String,
    pub surname: String,
}

impl Author {
    pub fn new(given: impl Into<String>, surname: impl Into<String>) -> Self {
        Self {
            given: given.into(),
            surname: surname.into(),
        }
    }

    pub fn others() -> Self {
        Self::new("", OTHERS_SENTINEL)
    }

    pub fn is_others(&self) -> bool {
        self.surname.eq_ignore_ascii_case(OTHERS_SENTINEL)
    }

    fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) if s.trim().eq_ignore_ascii_case(OTHERS_SENTINEL) => {
                Some(Self::others())
            }
            JsonValue::Array(parts) => match parts.as_slice() {
                [JsonValue::String(single)] if single.trim().eq_ignore_ascii_case(OTHERS_SENTINEL) => {
                    Some(Self::others())
                }
                [JsonValue::String(given), JsonValue::String(surname)] => {
                    Some(Self::new(given.trim(), surname.trim()))
                }
                _ => None,
            },
            _ => None,
        }
    }
}

/// One bibliographic entry. `authors` is `None` when the entry has no author field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    pub entry_type: Option<String>,
    pub authors: Option<Vec<Author>>,
    pub fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new(id: impl Into<String>, authors: Option<Vec<Author>>) -> Self {
        Self {
            id: id.into(),
            entry_type: None,
            authors,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn from_json(value: &JsonValue) -> Result<Self, RecordError> {
        let obj = value.as_object().ok_or(RecordError::NotAnObject)?;

        let id = ["ID", "id"]
            .iter()
            .filter_map(|k| obj.get(*k))
            .find_map(scalar_to_string)
            .filter(|s| !s.trim().is_empty())
            .ok_or(RecordError::MissingId)?;

        let entry_type = obj.get("ENTRYTYPE").and_then(scalar_to_string);

        let authors = match obj.get(AUTHOR_FIELD) {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::Array(entries)) => {
                let mut authors = Vec::with_capacity(entries.len());
                for entry in entries {
                    match Author::from_json(entry) {
                        Some(author) => authors.push(author),
                        None => debug!("Record {}: dropping malformed author entry {}", id, entry),
                    }
                }
                Some(authors)
            }
            Some(_) => return Err(RecordError::MalformedAuthors { id }),
        };

        let mut fields = BTreeMap::new();
        for (key, val) in obj {
            if matches!(key.as_str(), "ID" | "id" | "ENTRYTYPE") || key == AUTHOR_FIELD {
                continue;
            }
            if let Some(s) = scalar_to_string(val) {
                fields.insert(key.to_lowercase(), s);
            }
        }

        Ok(Self {
            id,
            entry_type,
            authors,
            fields,
        })
    }

    /// Field value if present and non-empty.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// True when the author list is truncated with the "others" sentinel.
    pub fn is_open_ended(&self) -> bool {
        self.authors
            .as_ref()
            .and_then(|a| a.last())
            .map_or(false, Author::is_others)
    }

    /// Authors without the trailing "others" sentinel.
    pub fn explicit_authors(&self) -> &[Author] {
        match self.authors.as_deref() {
            Some(all) if self.is_open_ended() => &all[..all.len() - 1],
            Some(all) => all,
            None => &[],
        }
    }

    pub fn explicit_author_count(&self) -> usize {
        self.explicit_authors().len()
    }
}

fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Flat storage for all records of a run. Everything downstream refers to records by index.
#[derive(Debug, Clone, Default)]
pub struct RecordArena {
    records: Vec<Record>,
    skipped: usize,
}

impl RecordArena {
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            records,
            skipped: 0,
        }
    }

    /// Builds the arena from a JSON array. Bad records are skipped and counted.
    pub fn from_json_value(value: &JsonValue) -> Result<Self, RecordError> {
        let entries = value.as_array().ok_or(RecordError::NotAnArray)?;
        let mut records = Vec::with_capacity(entries.len());
        let mut skipped = 0;
        let mut seen_ids = HashSet::new();

        for (position, entry) in entries.iter().enumerate() {
            match Record::from_json(entry) {
                Ok(record) => {
                    if !seen_ids.insert(record.id.clone()) {
                        warn!(
                            "Record id {} appears more than once (position {})",
                            record.id, position
                        );
                    }
                    records.push(record);
                }
                Err(e) => {
                    warn!("Skipping input record at position {}: {}", position, e);
                    skipped += 1;
                }
            }
        }

        Ok(Self { records, skipped })
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read records from {}", path.display()))?;
        let value: JsonValue = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {} as JSON", path.display()))?;
        let arena = Self::from_json_value(&value)
            .with_context(|| format!("Unexpected record layout in {}", path.display()))?;
        info!(
            "Loaded {} records from {} ({} skipped)",
            arena.len(),
            path.display(),
            arena.skipped_count()
        );
        Ok(arena)
    }

    pub fn get(&self, idx: usize) -> Option<&Record> {
        self.records.get(idx)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped
    }
}

impl std::ops::Index<usize> for RecordArena {
    type Output = Record;

    fn index(&self, idx: usize) -> &Record {
        &self.records[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_json() {
        let record = Record::from_json(&json!({
            "ID": "smith2020",
            "ENTRYTYPE": "article",
            "author": [["John", "Smith"], ["others"]],
            "title": "On Things",
            "year": 2020,
            "Journal": "J. Stuff",
            "extra": {"nested": true}
        }))
        .unwrap();

        assert_eq!(record.id, "smith2020");
        assert_eq!(record.entry_type.as_deref(), Some("article"));
        assert!(record.is_open_ended());
        assert_eq!(record.explicit_author_count(), 1);
        assert_eq!(record.field("year"), Some("2020"));
        assert_eq!(record.field("journal"), Some("J. Stuff"));
        assert_eq!(record.field("extra"), None);
    }

    #[test]
    fn test_id_fallback_and_missing_id() {
        let record = Record::from_json(&json!({"id": "lower"})).unwrap();
        assert_eq!(record.id, "lower");
        assert!(record.authors.is_none());

        assert_eq!(
            Record::from_json(&json!({"title": "No id"})),
            Err(RecordError::MissingId)
        );
        assert_eq!(
            Record::from_json(&json!({"ID": "  "})),
            Err(RecordError::MissingId)
        );
    }

    #[test]
    fn test_malformed_authors() {
        assert_eq!(
            Record::from_json(&json!({"ID": "x", "author": "John Smith"})),
            Err(RecordError::MalformedAuthors { id: "x".into() })
        );

        let record =
            Record::from_json(&json!({"ID": "y", "author": [["A", "B"], [1, 2], ["C", "D"]]}))
                .unwrap();
        assert_eq!(record.explicit_author_count(), 2);
    }

    #[test]
    fn test_arena_skips_bad_records() {
        let arena = RecordArena::from_json_value(&json!([
            {"ID": "a", "author": [["A", "B"]]},
            {"title": "no id"},
            42,
            {"ID": "b"}
        ]))
        .unwrap();
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.skipped_count(), 2);
        assert_eq!(arena[1].id, "b");

        assert_eq!(
            RecordArena::from_json_value(&json!({"ID": "a"})).unwrap_err(),
            RecordError::NotAnArray
        );
    }
}
