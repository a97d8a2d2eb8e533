// src/classifier/trainer.rs
//
// Offline logistic-regression fitting over a training log.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::classifier::model::{sigmoid, ClassifierWeights, FittedModel, DECISION_BOUNDARY};
use crate::classifier::training_log::{TrainingExample, TrainingLog};
use crate::models::schema::FieldVocabulary;
use crate::utils::error::TrainingDataError;

#[derive(Debug, Clone)]
pub struct TrainerParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2_penalty: f64,
    pub holdout_fraction: f64,
    pub seed: u64,
}

impl Default for TrainerParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            epochs: 2000,
            l2_penalty: 1e-4,
            holdout_fraction: 0.1,
            seed: 2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WeightTrainer {
    params: TrainerParams,
}

fn with_bias(example: &TrainingExample) -> Vec<f64> {
    let mut row = Vec::with_capacity(example.features.len() + 1);
    row.push(1.0);
    row.extend_from_slice(&example.features);
    row
}

fn accuracy(weights: &[f64], rows: &[(Vec<f64>, f64)]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let correct = rows
        .iter()
        .filter(|(x, y)| {
            let logit: f64 = weights.iter().zip(x).map(|(w, f)| w * f).sum();
            (sigmoid(logit) > DECISION_BOUNDARY) == (*y > 0.5)
        })
        .count();
    correct as f64 / rows.len() as f64
}

impl WeightTrainer {
    pub fn new(params: TrainerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrainerParams {
        &self.params
    }

    /// Seeded shuffle, held-out split, then full-batch gradient descent with
    /// L2 on every weight but the bias.
    pub fn fit(
        &self,
        log: &TrainingLog,
        vocabulary: &FieldVocabulary,
    ) -> Result<FittedModel, TrainingDataError> {
        if log.is_empty() {
            return Err(TrainingDataError::Empty);
        }
        let width = vocabulary.len();
        for (i, example) in log.examples().iter().enumerate() {
            if example.features.len() != width {
                return Err(TrainingDataError::RowWidth {
                    row: i + 1,
                    expected: width,
                    actual: example.features.len(),
                });
            }
        }
        let (duplicates, uniques) = log.class_counts();
        if duplicates == 0 || uniques == 0 {
            let label = if duplicates == 0 { "unique" } else { "duplicate" };
            return Err(TrainingDataError::SingleClass {
                label: label.to_string(),
            });
        }

        let mut rows: Vec<(Vec<f64>, f64)> = log
            .examples()
            .iter()
            .map(|e| (with_bias(e), e.label.target()))
            .collect();
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        rows.shuffle(&mut rng);

        let n = rows.len();
        let test_size = if n < 2 {
            0
        } else {
            ((n as f64 * self.params.holdout_fraction).ceil() as usize).min(n - 1)
        };
        let (test, train) = rows.split_at(test_size);
        info!(
            "Fitting classifier on {} examples ({} held out, {} duplicates / {} unique)",
            n, test_size, duplicates, uniques
        );

        let dims = width + 1;
        let m = train.len() as f64;
        let mut weights = vec![0.0; dims];
        let mut gradient = vec![0.0; dims];

        for epoch in 0..self.params.epochs {
            gradient.iter_mut().for_each(|g| *g = 0.0);
            for (x, y) in train {
                let logit: f64 = weights.iter().zip(x).map(|(w, f)| w * f).sum();
                let error = sigmoid(logit) - y;
                for (g, f) in gradient.iter_mut().zip(x) {
                    *g += error * f;
                }
            }
            for (j, (w, g)) in weights.iter_mut().zip(&gradient).enumerate() {
                let penalty = if j == 0 { 0.0 } else { self.params.l2_penalty * *w };
                *w -= self.params.learning_rate * (g / m + penalty);
            }
            if epoch % 500 == 0 {
                debug!(
                    "epoch {}: train accuracy {:.3}",
                    epoch,
                    accuracy(&weights, train)
                );
            }
        }

        let train_accuracy = accuracy(&weights, train);
        let test_accuracy = if test.is_empty() {
            None
        } else {
            Some(accuracy(&weights, test))
        };
        info!(
            "Fitting complete: train accuracy {:.3}, held-out accuracy {}",
            train_accuracy,
            test_accuracy.map_or_else(|| "n/a".to_string(), |a| format!("{:.3}", a))
        );

        let weights = ClassifierWeights::new(weights, vocabulary)?;

        Ok(FittedModel {
            weights,
            example_count: n,
            train_accuracy,
            test_accuracy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::matching::{DistanceVector, Label};

    fn vocab() -> FieldVocabulary {
        FieldVocabulary::new(["title", "year"])
    }

    fn separable_log(vocab: &FieldVocabulary) -> TrainingLog {
        let mut log = TrainingLog::new(vocab);
        for i in 0..20 {
            let small = i as f64 * 0.01;
            let dup: DistanceVector = [("title", small), ("year", 0.0)].into_iter().collect();
            log.record(Label::Duplicate, &dup, vocab);
            let uniq: DistanceVector = [("title", 0.8 + small), ("year", 0.5)].into_iter().collect();
            log.record(Label::Unique, &uniq, vocab);
        }
        log
    }

    #[test]
    fn test_fit_on_separable_data() {
        let vocab = vocab();
        let log = separable_log(&vocab);
        let model = WeightTrainer::default().fit(&log, &vocab).unwrap();

        assert_eq!(model.example_count, 40);
        assert!(model.train_accuracy >= 0.95, "{}", model.train_accuracy);
        assert!(model.test_accuracy.is_some());
        assert_eq!(model.weights.len(), 3);
        // Larger title distance must push toward "unique".
        assert!(model.weights.as_slice()[1] < 0.0);
    }

    #[test]
    fn test_fit_is_reproducible() {
        let vocab = vocab();
        let log = separable_log(&vocab);
        let trainer = WeightTrainer::default();
        assert_eq!(
            trainer.fit(&log, &vocab).unwrap(),
            trainer.fit(&log, &vocab).unwrap()
        );
    }

    #[test]
    fn test_fit_rejects_bad_logs() {
        let vocab = vocab();
        let trainer = WeightTrainer::default();

        assert!(matches!(
            trainer.fit(&TrainingLog::new(&vocab), &vocab),
            Err(TrainingDataError::Empty)
        ));

        let mut one_class = TrainingLog::new(&vocab);
        one_class.record(Label::Duplicate, &DistanceVector::new(), &vocab);
        assert!(matches!(
            trainer.fit(&one_class, &vocab),
            Err(TrainingDataError::SingleClass { .. })
        ));

        let other_vocab = FieldVocabulary::new(["title"]);
        let log = separable_log(&vocab);
        assert!(matches!(
            trainer.fit(&log, &other_vocab),
            Err(TrainingDataError::RowWidth { .. })
        ));
    }
}
