// src/clustering/mod.rs
pub mod duplicate_groups;

pub use duplicate_groups::{group_duplicates, DuplicateGroup};
