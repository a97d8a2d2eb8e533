// src/models/schema.rs
//
// BibTeX entry-type schema and the deep-comparison field vocabulary derived from it.
// Built once at startup and passed to whatever needs it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::record::Record;

pub const AUTHOR_FIELD: &str = "author";
pub const KEY_FIELD: &str = "key";
pub const OTHERS_SENTINEL: &str = "others";

/// A required slot of an entry type: either one field, or any one of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRequirement {
    Single(&'static str),
    AnyOf(&'static [&'static str]),
}

impl FieldRequirement {
    fn fields(&self) -> Vec<&'static str> {
        match self {
            FieldRequirement::Single(f) => vec![*f],
            FieldRequirement::AnyOf(group) => group.to_vec(),
        }
    }

    fn is_satisfied_by(&self, record: &Record) -> bool {
        let has = |field: &str| {
            if field == AUTHOR_FIELD {
                record.authors.as_ref().map_or(false, |a| !a.is_empty())
            } else {
                record.field(field).is_some()
            }
        };
        match self {
            FieldRequirement::Single(f) => has(f),
            FieldRequirement::AnyOf(group) => group.iter().any(|f| has(f)),
        }
    }

    fn describe(&self) -> String {
        match self {
            FieldRequirement::Single(f) => f.to_string(),
            FieldRequirement::AnyOf(group) => group.join("|"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntryType {
    pub name: &'static str,
    pub required: Vec<FieldRequirement>,
    pub optional: Vec<&'static str>,
}

/// Sorted list of fields compared by the deep comparator. Index order is the
/// column order of feature vectors and classifier weights (after the bias).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldVocabulary {
    fields: Vec<String>,
}

impl FieldVocabulary {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = fields.into_iter().map(Into::into).collect();
        Self {
            fields: set.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.fields
            .binary_search_by(|probe| probe.as_str().cmp(field))
            .ok()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.index_of(field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.fields
    }
}

#[derive(Debug, Clone)]
pub struct FieldSchema {
    entry_types: Vec<EntryType>,
    vocabulary: FieldVocabulary,
}

impl FieldSchema {
    pub fn standard() -> Self {
        use FieldRequirement::{AnyOf, Single};

        const AUTHOR_OR_EDITOR: &[&str] = &["author", "editor"];
        const CHAPTER_OR_PAGES: &[&str] = &["chapter", "pages"];
        const PROCEEDINGS_OPTIONAL: &[&str] = &[
            "editor",
            "pages",
            "organization",
            "publisher",
            "address",
            "month",
            "note",
            "key",
        ];
        const BOOK_OPTIONAL: &[&str] = &[
            "volume", "series", "address", "edition", "month", "note", "key",
        ];
        const THESIS_OPTIONAL: &[&str] = &["address", "month", "note", "key"];

        fn entry(
            name: &'static str,
            required: Vec<FieldRequirement>,
            optional: &[&'static str],
        ) -> EntryType {
            EntryType {
                name,
                required,
                optional: optional.to_vec(),
            }
        }

        let entry_types = vec![
            entry("STRING", vec![], &[]),
            entry("PREAMBLE", vec![], &[]),
            entry(
                "ARTICLE",
                vec![
                    Single("author"),
                    Single("title"),
                    Single("journal"),
                    Single("year"),
                ],
                &["volume", "number", "pages", "month", "note", "key"],
            ),
            entry(
                "BOOK",
                vec![
                    AnyOf(AUTHOR_OR_EDITOR),
                    Single("title"),
                    Single("publisher"),
                    Single("year"),
                ],
                BOOK_OPTIONAL,
            ),
            entry(
                "BOOKLET",
                vec![Single("title")],
                &["author", "howpublished", "address", "month", "year", "note", "key"],
            ),
            entry(
                "CONFERENCE",
                vec![
                    Single("author"),
                    Single("title"),
                    Single("booktitle"),
                    Single("year"),
                ],
                PROCEEDINGS_OPTIONAL,
            ),
            entry(
                "INPROCEEDINGS",
                vec![
                    Single("author"),
                    Single("title"),
                    Single("booktitle"),
                    Single("year"),
                ],
                PROCEEDINGS_OPTIONAL,
            ),
            entry(
                "INBOOK",
                vec![
                    AnyOf(AUTHOR_OR_EDITOR),
                    Single("title"),
                    AnyOf(CHAPTER_OR_PAGES),
                    Single("publisher"),
                    Single("year"),
                ],
                BOOK_OPTIONAL,
            ),
            entry(
                "INCOLLECTION",
                vec![
                    Single("author"),
                    Single("title"),
                    Single("booktitle"),
                    Single("year"),
                ],
                PROCEEDINGS_OPTIONAL,
            ),
            entry(
                "MANUAL",
                vec![Single("title")],
                &[
                    "author",
                    "organization",
                    "address",
                    "edition",
                    "month",
                    "year",
                    "note",
                    "key",
                ],
            ),
            entry(
                "MASTERSTHESIS",
                vec![
                    Single("author"),
                    Single("title"),
                    Single("school"),
                    Single("year"),
                ],
                THESIS_OPTIONAL,
            ),
            entry(
                "MISC",
                vec![],
                &["author", "title", "howpublished", "month", "year", "note", "key"],
            ),
            entry(
                "PHDTHESIS",
                vec![
                    Single("author"),
                    Single("title"),
                    Single("school"),
                    Single("year"),
                ],
                THESIS_OPTIONAL,
            ),
            entry(
                "PROCEEDINGS",
                vec![Single("title"), Single("year")],
                &[
                    "editor",
                    "publisher",
                    "organization",
                    "address",
                    "month",
                    "note",
                    "key",
                ],
            ),
            entry(
                "TECHREPORT",
                vec![
                    Single("author"),
                    Single("title"),
                    Single("institution"),
                    Single("year"),
                ],
                &["type", "number", "address", "month", "note", "key"],
            ),
            entry(
                "UNPUBLISHED",
                vec![Single("author"), Single("title"), Single("note")],
                &["month", "year", "key"],
            ),
        ];

        Self::from_entry_types(entry_types)
    }

    /// Vocabulary = every field mentioned by any entry type, minus author and key.
    pub fn from_entry_types(entry_types: Vec<EntryType>) -> Self {
        let mut fields: BTreeSet<&str> = BTreeSet::new();
        for et in &entry_types {
            for req in &et.required {
                fields.extend(req.fields());
            }
            fields.extend(et.optional.iter().copied());
        }
        fields.remove(AUTHOR_FIELD);
        fields.remove(KEY_FIELD);

        Self {
            entry_types,
            vocabulary: FieldVocabulary::new(fields),
        }
    }

    pub fn vocabulary(&self) -> &FieldVocabulary {
        &self.vocabulary
    }

    pub fn entry_type(&self, name: &str) -> Option<&EntryType> {
        self.entry_types
            .iter()
            .find(|et| et.name.eq_ignore_ascii_case(name))
    }

    pub fn entry_types(&self) -> &[EntryType] {
        &self.entry_types
    }

    /// Required slots the record leaves empty, for its declared entry type.
    /// Unknown or undeclared entry types report nothing.
    pub fn missing_required(&self, record: &Record) -> Vec<String> {
        let Some(et) = record
            .entry_type
            .as_deref()
            .and_then(|name| self.entry_type(name))
        else {
            return Vec::new();
        };
        et.required
            .iter()
            .filter(|req| !req.is_satisfied_by(record))
            .map(FieldRequirement::describe)
            .collect()
    }
}
