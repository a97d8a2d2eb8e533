// src/classifier/mod.rs
pub mod decision;
pub mod model;
pub mod trainer;
pub mod training_log;

pub use decision::{
    Decision, DecisionProvider, FixedDecision, InteractiveReviewer, RecordedDecisions,
    ReviewContext,
};
pub use model::{ClassifierModel, ClassifierWeights, FittedModel, ModelArtifact, Prediction};
pub use trainer::{TrainerParams, WeightTrainer};
pub use training_log::{TrainingExample, TrainingLog};
