// src/matching/mod.rs
pub mod author_key;
pub mod blocking;
pub mod deep;
pub mod manager;
pub mod phonetic;
pub mod shallow;

pub use author_key::author_key;
pub use blocking::{Blocking, BlockingEngine, CandidatePair};
pub use deep::DeepComparator;
pub use manager::{DedupePipeline, PipelineMode};
pub use phonetic::PhoneticEncoder;
pub use shallow::{ShallowScore, ShallowScorer};
