// src/utils/error.rs
use thiserror::Error;

/// Problems with a single input record. The record is skipped and counted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no non-empty \"ID\" or \"id\" field")]
    MissingId,

    #[error("record {id}: author field must be a list of [given, surname] pairs")]
    MalformedAuthors { id: String },

    #[error("input must be a JSON array of records")]
    NotAnArray,
}

/// Per-pair failures while scoring. The pair is skipped and the run continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("cannot phonetically encode {name:?}: non-ASCII character {ch:?}")]
    Encoding { name: String, ch: char },

    #[error("records {left} and {right} have no explicit authors to compare")]
    NoComparableAuthors { left: String, right: String },
}

/// Invalid settings. Fatal at construction time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a finite value >= 0, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("low error cutoff ({low}) must not exceed high error cutoff ({high})")]
    InvertedCutoffs { low: f64, high: f64 },

    #[error("classifier weights must hold {expected} values (bias + one per field), got {actual}")]
    WeightLength { expected: usize, actual: usize },

    #[error("classifier weight at position {index} is not finite")]
    NonFiniteWeight { index: usize },

    #[error("{name} must be greater than zero")]
    ZeroSize { name: &'static str },

    #[error("environment variable {var} has an unparsable value {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Problems with labeled training data. Fatal to fitting only.
#[derive(Error, Debug)]
pub enum TrainingDataError {
    #[error("training log is empty")]
    Empty,

    #[error("training log only contains {label} examples; both classes are required")]
    SingleClass { label: String },

    #[error("row {row}: expected {expected} feature values, got {actual}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("row {row}: label must be 0 or 1, got {value:?}")]
    InvalidLabel { row: usize, value: String },

    #[error("row {row}, column {column}: {value:?} is not a number")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("training log header does not match the field vocabulary (expected {expected:?}, got {actual:?})")]
    HeaderMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("fitting produced unusable weights: {0}")]
    Diverged(#[from] ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures loading or saving a model artifact.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model artifact is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model was fitted for fields {artifact:?} but the schema vocabulary is {schema:?}")]
    VocabularyMismatch {
        artifact: Vec<String>,
        schema: Vec<String>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
