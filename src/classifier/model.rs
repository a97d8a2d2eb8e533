// src/classifier/model.rs
use anyhow::Context;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::models::matching::{DistanceVector, Label};
use crate::models::schema::FieldVocabulary;
use crate::utils::error::{ConfigError, ModelError};

/// Reference weights fitted for the standard 20-field vocabulary, bias first.
pub const DEFAULT_WEIGHTS: [f64; 21] = [
    200.064, 1.192, -3.152, 33.034, 0.000, 0.985, 80.515, -3.527, -2.330, -1.916, 0.006, 1.863,
    0.149, -0.108, -1.397, 87.715, 1.519, -13.372, -10.149, -2.609, -1.637,
];

/// Scores strictly above this are duplicates.
pub const DECISION_BOUNDARY: f64 = 0.5;

/// Logistic function clamped to the open interval (0, 1).
pub fn sigmoid(x: f64) -> f64 {
    let p = 1.0 / (1.0 + (-x).exp());
    if p.is_nan() {
        return 0.5;
    }
    p.clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON)
}

/// `[1, d_1 .. d_n]` over the vocabulary with -1 for fields not compared.
pub fn feature_vector(distances: &DistanceVector, vocabulary: &FieldVocabulary) -> Vec<f64> {
    let mut features = Vec::with_capacity(vocabulary.len() + 1);
    features.push(1.0);
    features.extend(distances.feature_row(vocabulary));
    features
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierWeights {
    weights: Vec<f64>,
}

impl ClassifierWeights {
    pub fn new(weights: Vec<f64>, vocabulary: &FieldVocabulary) -> Result<Self, ConfigError> {
        let expected = vocabulary.len() + 1;
        if weights.len() != expected {
            return Err(ConfigError::WeightLength {
                expected,
                actual: weights.len(),
            });
        }
        if let Some(index) = weights.iter().position(|w| !w.is_finite()) {
            return Err(ConfigError::NonFiniteWeight { index });
        }
        Ok(Self { weights })
    }

    /// Built-in reference weights; only valid for a 20-field vocabulary.
    pub fn reference(vocabulary: &FieldVocabulary) -> Result<Self, ConfigError> {
        Self::new(DEFAULT_WEIGHTS.to_vec(), vocabulary)
    }

    pub fn bias(&self) -> f64 {
        self.weights[0]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn score(&self, features: &[f64]) -> f64 {
        let logit: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, f)| w * f)
            .sum();
        sigmoid(logit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub weights: ClassifierWeights,
    pub example_count: usize,
    pub train_accuracy: f64,
    pub test_accuracy: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub score: f64,
    pub label: Label,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierModel {
    Fixed(ClassifierWeights),
    Fitted(FittedModel),
}

impl ClassifierModel {
    pub fn weights(&self) -> &ClassifierWeights {
        match self {
            ClassifierModel::Fixed(w) => w,
            ClassifierModel::Fitted(m) => &m.weights,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ClassifierModel::Fixed(_) => "fixed weights".to_string(),
            ClassifierModel::Fitted(m) => format!(
                "fitted weights ({} examples, train accuracy {:.3})",
                m.example_count, m.train_accuracy
            ),
        }
    }

    pub fn predict(&self, distances: &DistanceVector, vocabulary: &FieldVocabulary) -> Prediction {
        let score = self.weights().score(&feature_vector(distances, vocabulary));
        Prediction {
            score,
            label: Label::from_duplicate(score > DECISION_BOUNDARY),
        }
    }
}

/// Persisted form of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub id: Uuid,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub fields: Vec<String>,
    pub weights: Vec<f64>,
    pub example_count: usize,
    pub train_accuracy: f64,
    pub test_accuracy: Option<f64>,
}

impl ModelArtifact {
    pub fn from_fitted(model: &FittedModel, vocabulary: &FieldVocabulary, version: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            version,
            created_at: Utc::now(),
            fields: vocabulary.as_slice().to_vec(),
            weights: model.weights.as_slice().to_vec(),
            example_count: model.example_count,
            train_accuracy: model.train_accuracy,
            test_accuracy: model.test_accuracy,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(
            "Saved model {} (version {}) to {}",
            self.id,
            self.version,
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Checks the artifact against the schema vocabulary and rebuilds the model.
    pub fn into_model(self, vocabulary: &FieldVocabulary) -> Result<ClassifierModel, ModelError> {
        if self.fields != vocabulary.as_slice() {
            return Err(ModelError::VocabularyMismatch {
                artifact: self.fields,
                schema: vocabulary.as_slice().to_vec(),
            });
        }
        let weights = ClassifierWeights::new(self.weights, vocabulary)?;
        Ok(ClassifierModel::Fitted(FittedModel {
            weights,
            example_count: self.example_count,
            train_accuracy: self.train_accuracy,
            test_accuracy: self.test_accuracy,
        }))
    }
}

/// Model from an artifact path when given, otherwise the reference weights.
pub fn load_classifier(
    path: Option<&Path>,
    vocabulary: &FieldVocabulary,
) -> anyhow::Result<ClassifierModel> {
    match path {
        Some(p) => {
            let artifact = ModelArtifact::load(p)
                .with_context(|| format!("Failed to load model artifact {}", p.display()))?;
            info!(
                "Using model {} version {} from {}",
                artifact.id,
                artifact.version,
                p.display()
            );
            Ok(artifact.into_model(vocabulary)?)
        }
        None => Ok(ClassifierModel::Fixed(
            ClassifierWeights::reference(vocabulary)
                .context("Built-in weights do not fit the schema vocabulary")?,
        )),
    }
}
