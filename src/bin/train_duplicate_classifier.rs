// src/bin/train_duplicate_classifier.rs
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Instant;

use dedupe_lib::classifier::model::ModelArtifact;
use dedupe_lib::classifier::trainer::{TrainerParams, WeightTrainer};
use dedupe_lib::classifier::training_log::TrainingLog;
use dedupe_lib::models::schema::FieldSchema;
use dedupe_lib::utils::env::load_env;

#[derive(Parser)]
#[command(author, version, about = "Fit duplicate classifier weights from training logs", long_about = None)]
struct TrainArgs {
    /// One or more training log CSV files
    #[arg(required = true)]
    logs: Vec<PathBuf>,

    /// Where to write the model artifact
    #[arg(long, default_value = "duplicate_model.json")]
    output: PathBuf,

    /// Gradient descent step size
    #[arg(long, default_value_t = 0.5)]
    learning_rate: f64,

    /// Full passes over the training split
    #[arg(long, default_value_t = 2000)]
    epochs: usize,

    /// L2 penalty on field weights
    #[arg(long, default_value_t = 1e-4)]
    l2_penalty: f64,

    /// Share of examples held out for evaluation
    #[arg(long, default_value_t = 0.1)]
    holdout: f64,

    /// Shuffle seed
    #[arg(long, default_value_t = 2)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let args = TrainArgs::parse();
    let start_time = Instant::now();

    if !(0.0..1.0).contains(&args.holdout) {
        bail!("--holdout must be in [0, 1), got {}", args.holdout);
    }

    let schema = FieldSchema::standard();
    let vocabulary = schema.vocabulary();

    let mut log = TrainingLog::new(vocabulary);
    for path in &args.logs {
        let part = TrainingLog::read_csv(path, vocabulary)
            .with_context(|| format!("Failed to read training log {}", path.display()))?;
        log.extend(part)
            .with_context(|| format!("Training log {} does not match the schema", path.display()))?;
    }
    let (duplicates, uniques) = log.class_counts();
    info!(
        "📚 Loaded {} examples from {} file(s): {} duplicate / {} unique",
        log.len(),
        args.logs.len(),
        duplicates,
        uniques
    );

    let trainer = WeightTrainer::new(TrainerParams {
        learning_rate: args.learning_rate,
        epochs: args.epochs,
        l2_penalty: args.l2_penalty,
        holdout_fraction: args.holdout,
        seed: args.seed,
    });
    let fitted = trainer
        .fit(&log, vocabulary)
        .context("Failed to fit classifier weights")?;

    let version = if args.output.exists() {
        match ModelArtifact::load(&args.output) {
            Ok(previous) => {
                info!(
                    "Replacing model {} version {} at {}",
                    previous.id,
                    previous.version,
                    args.output.display()
                );
                previous.version + 1
            }
            Err(e) => {
                warn!(
                    "Existing file {} is not a model artifact ({}); starting at version 1",
                    args.output.display(),
                    e
                );
                1
            }
        }
    } else {
        1
    };

    let artifact = ModelArtifact::from_fitted(&fitted, vocabulary, version);
    artifact
        .save(&args.output)
        .with_context(|| format!("Failed to save model to {}", args.output.display()))?;

    println!("--- Duplicate Classifier Training Summary ---");
    println!("  Model:              {} (version {})", artifact.id, artifact.version);
    println!("  Examples:           {}", fitted.example_count);
    println!("  Train accuracy:     {:.4}", fitted.train_accuracy);
    match fitted.test_accuracy {
        Some(acc) => println!("  Held-out accuracy:  {:.4}", acc),
        None => println!("  Held-out accuracy:  n/a (too few examples)"),
    }
    println!("  Saved to:           {}", args.output.display());
    println!("  Elapsed:            {:.2?}", start_time.elapsed());
    println!("Run report_model_weights to inspect the fitted weights.");
    Ok(())
}
