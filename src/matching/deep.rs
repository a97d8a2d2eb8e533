// src/matching/deep.rs
use strsim::levenshtein;

use crate::models::matching::DistanceVector;
use crate::models::record::Record;
use crate::models::schema::FieldVocabulary;

/// Levenshtein distance divided by the longer length, in characters.
pub fn normalized_edit_distance(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    levenshtein(a, b) as f64 / longest as f64
}

/// A vocabulary field filled on both sides of a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedField<'a> {
    pub name: &'a str,
    pub left: &'a str,
    pub right: &'a str,
}

#[derive(Debug, Clone)]
pub struct DeepComparator {
    vocabulary: FieldVocabulary,
}

impl DeepComparator {
    pub fn new(vocabulary: FieldVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &FieldVocabulary {
        &self.vocabulary
    }

    pub fn shared_fields<'a>(&'a self, left: &'a Record, right: &'a Record) -> Vec<SharedField<'a>> {
        self.vocabulary
            .iter()
            .filter_map(|name| {
                let l = left.field(name)?;
                let r = right.field(name)?;
                Some(SharedField {
                    name,
                    left: l,
                    right: r,
                })
            })
            .collect()
    }

    /// Fields missing or empty on either side are left out, never stored as zero.
    pub fn compare(&self, left: &Record, right: &Record) -> DistanceVector {
        self.shared_fields(left, right)
            .into_iter()
            .map(|f| (f.name, normalized_edit_distance(f.left, f.right)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::FieldSchema;

    fn comparator() -> DeepComparator {
        DeepComparator::new(FieldSchema::standard().vocabulary().clone())
    }

    #[test]
    fn test_normalized_distance() {
        assert_eq!(normalized_edit_distance("", ""), 0.0);
        assert_eq!(normalized_edit_distance("abc", "abc"), 0.0);
        assert_eq!(normalized_edit_distance("abcd", "abce"), 0.25);
        assert_eq!(normalized_edit_distance("", "abc"), 1.0);
        assert_eq!(normalized_edit_distance("café", "cafe"), 0.25);
    }

    #[test]
    fn test_only_fields_present_on_both_sides() {
        let left = Record::new("a", None)
            .with_field("title", "Foo")
            .with_field("year", "2020");
        let right = Record::new("b", None).with_field("title", "Foo");

        let distances = comparator().compare(&left, &right);
        assert_eq!(distances.len(), 1);
        assert_eq!(distances.get("title"), Some(0.0));
        assert_eq!(distances.get("year"), None);
    }

    #[test]
    fn test_empty_and_unknown_fields_are_ignored() {
        let left = Record::new("a", None)
            .with_field("journal", "")
            .with_field("abstract", "long text")
            .with_field("pages", "1--10");
        let right = Record::new("b", None)
            .with_field("journal", "Nature")
            .with_field("abstract", "long text")
            .with_field("pages", "1--12");

        let distances = comparator().compare(&left, &right);
        assert_eq!(distances.get("journal"), None);
        assert_eq!(distances.get("abstract"), None);
        assert_eq!(distances.get("pages"), Some(0.2));
    }
}
