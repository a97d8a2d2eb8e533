// src/models/matching.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::schema::FieldVocabulary;

/// Feature value used for vocabulary fields that were not compared.
pub const ABSENT_FIELD: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Duplicate,
    Unique,
}

impl Label {
    pub fn from_duplicate(is_duplicate: bool) -> Self {
        if is_duplicate {
            Label::Duplicate
        } else {
            Label::Unique
        }
    }

    pub fn is_duplicate(self) -> bool {
        self == Label::Duplicate
    }

    /// Regression target: 1.0 for duplicates, 0.0 otherwise.
    pub fn target(self) -> f64 {
        match self {
            Label::Duplicate => 1.0,
            Label::Unique => 0.0,
        }
    }

    pub fn as_csv(self) -> &'static str {
        match self {
            Label::Duplicate => "1",
            Label::Unique => "0",
        }
    }

    pub fn from_csv(value: &str) -> Option<Self> {
        match value.trim() {
            "1" => Some(Label::Duplicate),
            "0" => Some(Label::Unique),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Duplicate => write!(f, "duplicate"),
            Label::Unique => write!(f, "unique"),
        }
    }
}

/// Normalized edit distance per field compared between two records.
/// Only fields present and non-empty on both sides have an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceVector {
    distances: BTreeMap<String, f64>,
}

impl DistanceVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, distance: f64) {
        self.distances.insert(field.into(), distance);
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.distances.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.distances.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn summed_error(&self) -> f64 {
        self.distances.values().sum()
    }

    /// One value per vocabulary field, in vocabulary order, with `ABSENT_FIELD` for gaps.
    pub fn feature_row(&self, vocabulary: &FieldVocabulary) -> Vec<f64> {
        vocabulary
            .iter()
            .map(|field| self.get(field).unwrap_or(ABSENT_FIELD))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for DistanceVector {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            distances: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// How a pair got its final label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    Classifier,
    AutoLabeled,
    Reviewed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub left_id: String,
    pub right_id: String,
    /// Classifier probability; absent for labels assigned in data-collection mode.
    pub score: Option<f64>,
    pub source: VerdictSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredPair {
    pub left_id: String,
    pub right_id: String,
    pub summed_error: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_csv_encoding() {
        assert_eq!(Label::Duplicate.as_csv(), "1");
        assert_eq!(Label::from_csv(" 0 "), Some(Label::Unique));
        assert_eq!(Label::from_csv("yes"), None);
        assert_eq!(Label::from_duplicate(true), Label::Duplicate);
    }

    #[test]
    fn test_feature_row_uses_absent_sentinel() {
        let vocab = FieldVocabulary::new(["journal", "title", "year"]);
        let distances: DistanceVector = [("title", 0.25), ("year", 0.0)].into_iter().collect();

        assert_eq!(distances.feature_row(&vocab), vec![ABSENT_FIELD, 0.25, 0.0]);
        assert!((distances.summed_error() - 0.25).abs() < 1e-12);
    }
}
