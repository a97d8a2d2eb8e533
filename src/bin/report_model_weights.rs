// src/bin/report_model_weights.rs

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use dedupe_lib::classifier::model::{load_classifier, ClassifierModel, ModelArtifact};
use dedupe_lib::models::schema::FieldSchema;
use dedupe_lib::utils::env::load_env;

#[derive(Parser)]
#[command(author, version, about = "Print duplicate classifier weights", long_about = None)]
struct ReportArgs {
    /// Model artifact; the built-in reference weights are shown when omitted
    model: Option<PathBuf>,
}

fn print_weights(fields: &[String], weights: &[f64]) {
    let Some((bias, field_weights)) = weights.split_first() else {
        println!("      No weights to report.");
        return;
    };

    let mut weighted_fields: Vec<(&str, f64)> = fields
        .iter()
        .map(String::as_str)
        .zip(field_weights.iter().copied())
        .collect();
    weighted_fields.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));

    println!("      Most Influential Fields (Sorted by Absolute Weight):");
    println!("      ------------------------------------------------------");
    println!("      | {:<35} | {:>10} |", "Field", "Weight");
    println!("      |---------------------------------------|------------|");
    for (name, weight) in &weighted_fields {
        println!("      | {:<35} | {:>10.4} |", name, weight);
    }
    println!("      |---------------------------------------|------------|");
    println!("      | {:<35} | {:>10.4} |", "(Bias Term)", bias);
    println!("      ------------------------------------------------------");
    println!("      A larger distance on a field with a negative weight pushes");
    println!("      the pair toward \"unique\"; absent fields contribute -1 x weight.\n");
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    load_env();
    let args = ReportArgs::parse();

    let schema = FieldSchema::standard();
    let vocabulary = schema.vocabulary();

    println!("--- Duplicate Classifier Weight Report ---");
    match &args.model {
        Some(path) => {
            let artifact = ModelArtifact::load(path)
                .with_context(|| format!("Failed to load model artifact {}", path.display()))?;
            println!("\nModel {} (version {})", artifact.id, artifact.version);
            println!("  Created:            {}", artifact.created_at.to_rfc3339());
            println!("  Examples:           {}", artifact.example_count);
            println!("  Train accuracy:     {:.4}", artifact.train_accuracy);
            if let Some(acc) = artifact.test_accuracy {
                println!("  Held-out accuracy:  {:.4}", acc);
            }
            if artifact.fields != vocabulary.as_slice() {
                println!("  WARNING: artifact fields differ from the current schema vocabulary");
            }
            println!();
            print_weights(&artifact.fields, &artifact.weights);
        }
        None => {
            let model = load_classifier(None, vocabulary)?;
            if let ClassifierModel::Fixed(weights) = &model {
                println!("\nBuilt-in reference weights\n");
                print_weights(vocabulary.as_slice(), weights.as_slice());
            }
        }
    }
    println!("--- End of Report ---");
    Ok(())
}
