// src/matching/shallow.rs
//
// Cheap author-only similarity used as the gate to deep comparison.

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use crate::matching::phonetic::PhoneticEncoder;
use crate::models::record::Record;
use crate::utils::error::ScoringError;

pub const DEFAULT_SHALLOW_DEEP_THRESHOLD: f64 = 3.4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShallowScore {
    /// Average per author of given + surname Jaro-Winkler similarity, in [0, 2].
    pub edit: f64,
    /// Average per author of given + surname Soundex similarity, in [0, 2].
    pub phonetic: f64,
    pub compared_authors: usize,
}

impl ShallowScore {
    /// Combined score in [0, 4].
    pub fn product(&self) -> f64 {
        self.edit * self.phonetic
    }

    pub fn is_promoted(&self, threshold: f64) -> bool {
        self.product() >= threshold
    }
}

/// A given name counts as an initial when it is a single letter or its second
/// character is a period ("J.", "J.R.").
pub fn is_abbreviated(given: &str) -> bool {
    let mut chars = given.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(_), Some('.')) => true,
        (Some(c), None) => c.is_alphabetic(),
        _ => false,
    }
}

/// Argument order is canonicalized so the score is exactly symmetric.
fn symmetric_jaro_winkler(a: &str, b: &str) -> f64 {
    if a <= b {
        jaro_winkler(a, b)
    } else {
        jaro_winkler(b, a)
    }
}

pub struct ShallowScorer {
    encoder: PhoneticEncoder,
}

impl ShallowScorer {
    pub fn new(encoder: PhoneticEncoder) -> Self {
        Self { encoder }
    }

    pub fn encoder(&self) -> &PhoneticEncoder {
        &self.encoder
    }

    /// Compares authors position by position over the shorter explicit list.
    pub fn score(&mut self, left: &Record, right: &Record) -> Result<ShallowScore, ScoringError> {
        let left_authors = left.explicit_authors();
        let right_authors = right.explicit_authors();
        let compared = left_authors.len().min(right_authors.len());
        if compared == 0 {
            return Err(ScoringError::NoComparableAuthors {
                left: left.id.clone(),
                right: right.id.clone(),
            });
        }

        let mut edit = 0.0;
        let mut phonetic = 0.0;
        for (a, b) in left_authors.iter().zip(right_authors).take(compared) {
            if is_abbreviated(&a.given) || is_abbreviated(&b.given) {
                edit += 1.0;
                phonetic += 1.0;
            } else {
                edit += symmetric_jaro_winkler(&a.given, &b.given);
                phonetic += self.encoder.similarity(&a.given, &b.given)?;
            }
            edit += symmetric_jaro_winkler(&a.surname, &b.surname);
            phonetic += self.encoder.similarity(&a.surname, &b.surname)?;
        }

        Ok(ShallowScore {
            edit: edit / compared as f64,
            phonetic: phonetic / compared as f64,
            compared_authors: compared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::Author;

    fn scorer() -> ShallowScorer {
        ShallowScorer::new(PhoneticEncoder::new(10, 128))
    }

    fn record(id: &str, authors: &[(&str, &str)]) -> Record {
        Record::new(
            id,
            Some(authors.iter().map(|(g, s)| Author::new(*g, *s)).collect()),
        )
    }

    #[test]
    fn test_abbreviation_detection() {
        assert!(is_abbreviated("J."));
        assert!(is_abbreviated("J.R."));
        assert!(is_abbreviated("J"));
        assert!(!is_abbreviated("John"));
        assert!(!is_abbreviated(""));
        assert!(!is_abbreviated("Jo."));
    }

    #[test]
    fn test_initial_against_full_name_is_promoted() {
        let mut scorer = scorer();
        let score = scorer
            .score(&record("a", &[("J.", "Smith")]), &record("b", &[("John", "Smith")]))
            .unwrap();
        assert_eq!(score.edit, 2.0);
        assert_eq!(score.phonetic, 2.0);
        assert_eq!(score.product(), 4.0);
        assert!(score.is_promoted(DEFAULT_SHALLOW_DEEP_THRESHOLD));
    }

    #[test]
    fn test_different_surnames_are_not_promoted() {
        let mut scorer = scorer();
        let score = scorer
            .score(&record("a", &[("John", "Smith")]), &record("b", &[("John", "Jones")]))
            .unwrap();
        assert!(score.product() < DEFAULT_SHALLOW_DEEP_THRESHOLD);
        assert!(score.product() >= 0.0 && score.product() <= 4.0);
    }

    #[test]
    fn test_score_is_symmetric() {
        let pairs = [
            (
                record("a", &[("Martha", "Dixon"), ("Ann", "Lee")]),
                record("b", &[("Marhta", "Dicksonn"), ("Anne", "Li"), ("Bo", "Ek")]),
            ),
            (
                record("c", &[("Dwayne", "Duane")]),
                record("d", &[("Dwane", "Duwayne")]),
            ),
        ];
        for (left, right) in &pairs {
            let mut s = scorer();
            let forward = s.score(left, right).unwrap();
            let backward = s.score(right, left).unwrap();
            assert_eq!(forward, backward);
        }
    }

    #[test]
    fn test_only_shorter_list_is_compared() {
        let mut scorer = scorer();
        let score = scorer
            .score(
                &record("a", &[("John", "Smith")]),
                &record("b", &[("John", "Smith"), ("Zed", "Zulu")]),
            )
            .unwrap();
        assert_eq!(score.compared_authors, 1);
        assert_eq!(score.product(), 4.0);
    }

    #[test]
    fn test_errors_skip_pair() {
        let mut scorer = scorer();
        let no_authors = scorer.score(&record("a", &[]), &record("b", &[("John", "Smith")]));
        assert!(matches!(
            no_authors,
            Err(ScoringError::NoComparableAuthors { .. })
        ));

        let non_ascii = scorer.score(
            &record("a", &[("José", "García")]),
            &record("b", &[("Jose", "Garcia")]),
        );
        assert!(matches!(non_ascii, Err(ScoringError::Encoding { .. })));
    }
}
