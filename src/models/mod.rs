// src/models/mod.rs
pub mod matching;
pub mod record;
pub mod schema;
pub mod stats_models;

pub use matching::{DistanceVector, Label};
pub use record::{Author, Record, RecordArena};
pub use schema::{FieldSchema, FieldVocabulary};
