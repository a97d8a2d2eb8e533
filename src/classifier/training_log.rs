// src/classifier/training_log.rs
use log::info;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::models::matching::{DistanceVector, Label};
use crate::models::schema::FieldVocabulary;
use crate::utils::error::TrainingDataError;

const LABEL_COLUMN: &str = "label";

/// One labeled pair: a value per vocabulary field, -1 where the field was not compared.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub label: Label,
    pub features: Vec<f64>,
}

/// Append-only sink of labeled examples, persisted as CSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingLog {
    fields: Vec<String>,
    examples: Vec<TrainingExample>,
}

impl TrainingLog {
    pub fn new(vocabulary: &FieldVocabulary) -> Self {
        Self {
            fields: vocabulary.as_slice().to_vec(),
            examples: Vec::new(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn record(&mut self, label: Label, distances: &DistanceVector, vocabulary: &FieldVocabulary) {
        self.examples.push(TrainingExample {
            label,
            features: distances.feature_row(vocabulary),
        });
    }

    pub fn push(&mut self, example: TrainingExample) -> Result<(), TrainingDataError> {
        if example.features.len() != self.fields.len() {
            return Err(TrainingDataError::RowWidth {
                row: self.examples.len() + 1,
                expected: self.fields.len(),
                actual: example.features.len(),
            });
        }
        self.examples.push(example);
        Ok(())
    }

    /// (duplicates, uniques)
    pub fn class_counts(&self) -> (usize, usize) {
        let duplicates = self
            .examples
            .iter()
            .filter(|e| e.label.is_duplicate())
            .count();
        (duplicates, self.examples.len() - duplicates)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), TrainingDataError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let mut header = vec![LABEL_COLUMN.to_string()];
        header.extend(self.fields.iter().cloned());
        csv_writer.write_record(&header)?;

        for example in &self.examples {
            let mut row = vec![example.label.as_csv().to_string()];
            row.extend(example.features.iter().map(|v| v.to_string()));
            csv_writer.write_record(&row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), TrainingDataError> {
        let file = File::create(path)?;
        self.write_to(file)?;
        info!(
            "Wrote {} training examples to {}",
            self.examples.len(),
            path.display()
        );
        Ok(())
    }

    /// Reads a log whose header must be `label` followed by the vocabulary fields.
    pub fn read_from<R: Read>(
        reader: R,
        vocabulary: &FieldVocabulary,
    ) -> Result<Self, TrainingDataError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let header: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let mut expected = vec![LABEL_COLUMN.to_string()];
        expected.extend(vocabulary.iter().map(str::to_string));
        if header != expected {
            return Err(TrainingDataError::HeaderMismatch {
                expected,
                actual: header,
            });
        }

        let mut log = Self::new(vocabulary);
        for (i, result) in csv_reader.records().enumerate() {
            let row = i + 1;
            let record = result?;
            if record.len() != expected.len() {
                return Err(TrainingDataError::RowWidth {
                    row,
                    expected: vocabulary.len(),
                    actual: record.len().saturating_sub(1),
                });
            }
            let raw_label = record.get(0).unwrap_or_default();
            let label = Label::from_csv(raw_label).ok_or_else(|| TrainingDataError::InvalidLabel {
                row,
                value: raw_label.to_string(),
            })?;

            let mut features = Vec::with_capacity(vocabulary.len());
            for (column, value) in expected.iter().skip(1).zip(record.iter().skip(1)) {
                let parsed: f64 = value.parse().map_err(|_| TrainingDataError::InvalidValue {
                    row,
                    column: column.clone(),
                    value: value.to_string(),
                })?;
                features.push(parsed);
            }
            log.push(TrainingExample { label, features })?;
        }
        Ok(log)
    }

    pub fn read_csv(path: &Path, vocabulary: &FieldVocabulary) -> Result<Self, TrainingDataError> {
        let file = File::open(path)?;
        let log = Self::read_from(file, vocabulary)?;
        info!(
            "Read {} training examples from {}",
            log.len(),
            path.display()
        );
        Ok(log)
    }

    pub fn extend(&mut self, other: TrainingLog) -> Result<(), TrainingDataError> {
        for example in other.examples {
            self.push(example)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::matching::ABSENT_FIELD;
    use tempfile::tempdir;

    fn vocab() -> FieldVocabulary {
        FieldVocabulary::new(["journal", "title", "year"])
    }

    #[test]
    fn test_csv_round_trip_keeps_absent_sentinel() {
        let vocab = vocab();
        let mut log = TrainingLog::new(&vocab);
        let dup: DistanceVector = [("title", 0.0), ("year", 0.0)].into_iter().collect();
        let uniq: DistanceVector = [("title", 0.75)].into_iter().collect();
        log.record(Label::Duplicate, &dup, &vocab);
        log.record(Label::Unique, &uniq, &vocab);

        let dir = tempdir().unwrap();
        let path = dir.path().join("examples.csv");
        log.write_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("label,journal,title,year\n"));

        let read_back = TrainingLog::read_csv(&path, &vocab).unwrap();
        assert_eq!(read_back, log);
        assert_eq!(read_back.examples()[1].features, vec![ABSENT_FIELD, 0.75, ABSENT_FIELD]);
        assert_eq!(read_back.class_counts(), (1, 1));
    }

    #[test]
    fn test_header_must_match_vocabulary() {
        let data = "label,title,year\n1,0,0\n";
        let err = TrainingLog::read_from(data.as_bytes(), &vocab()).unwrap_err();
        assert!(matches!(err, TrainingDataError::HeaderMismatch { .. }));
    }

    #[test]
    fn test_bad_rows_are_rejected() {
        let bad_label = "label,journal,title,year\n2,0,0,0\n";
        assert!(matches!(
            TrainingLog::read_from(bad_label.as_bytes(), &vocab()),
            Err(TrainingDataError::InvalidLabel { row: 1, .. })
        ));

        let bad_value = "label,journal,title,year\n1,0,abc,0\n";
        assert!(matches!(
            TrainingLog::read_from(bad_value.as_bytes(), &vocab()),
            Err(TrainingDataError::InvalidValue { row: 1, .. })
        ));

        let mut log = TrainingLog::new(&vocab());
        let short = TrainingExample {
            label: Label::Unique,
            features: vec![0.0],
        };
        assert!(matches!(
            log.push(short),
            Err(TrainingDataError::RowWidth { expected: 3, actual: 1, .. })
        ));
    }
}
