// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use dedupe_lib::classifier::decision::{DecisionProvider, InteractiveReviewer};
use dedupe_lib::classifier::model::load_classifier;
use dedupe_lib::classifier::training_log::TrainingLog;
use dedupe_lib::matching::manager::{DedupePipeline, PipelineMode};
use dedupe_lib::models::record::RecordArena;
use dedupe_lib::models::schema::FieldSchema;
use dedupe_lib::models::stats_models::DedupeReport;
use dedupe_lib::utils::config::DedupeConfig;
use dedupe_lib::utils::env::load_env;
use dedupe_lib::utils::get_memory_usage;
use dedupe_lib::utils::progress_bars::progress_config::ProgressConfig;

#[derive(Parser)]
#[command(author, version, about = "Find duplicate BibTeX records", long_about = None)]
struct DedupeArgs {
    /// JSON array of parsed BibTeX records
    input: PathBuf,

    /// Write the full JSON report here
    #[arg(long)]
    output: Option<PathBuf>,

    /// Fitted model artifact (defaults to DEDUPE_MODEL_PATH, then built-in weights)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Collect labeled examples instead of scoring with the classifier
    #[arg(long)]
    collect: bool,

    /// Ask on the console about gray-zone pairs (data collection only)
    #[arg(long)]
    review: bool,

    /// Training log to append labeled examples to
    #[arg(long, default_value = "training_log.csv")]
    training_log: PathBuf,

    /// Score candidate pairs on worker threads
    #[arg(long)]
    parallel: bool,

    /// Override the shallow -> deep promotion threshold
    #[arg(long)]
    threshold: Option<f64>,

    /// Override the auto-duplicate summed-error cutoff
    #[arg(long)]
    low_cutoff: Option<f64>,

    /// Override the auto-unique summed-error cutoff
    #[arg(long)]
    high_cutoff: Option<f64>,

    /// Override the number of parallel workers
    #[arg(long)]
    workers: Option<usize>,
}

fn apply_overrides(config: &mut DedupeConfig, args: &DedupeArgs) {
    if let Some(v) = args.threshold {
        config.shallow_deep_threshold = v;
    }
    if let Some(v) = args.low_cutoff {
        config.low_error_cutoff = v;
    }
    if let Some(v) = args.high_cutoff {
        config.high_error_cutoff = v;
    }
    if let Some(v) = args.workers {
        config.worker_count = v;
    }
    if let Some(path) = &args.model {
        config.model_path = Some(path.clone());
    }
}

fn report_schema_gaps(schema: &FieldSchema, arena: &RecordArena) {
    let mut incomplete = 0;
    for record in arena.iter() {
        let missing = schema.missing_required(record);
        if !missing.is_empty() {
            incomplete += 1;
            debug!("Record {} is missing required fields: {:?}", record.id, missing);
        }
    }
    if incomplete > 0 {
        info!(
            "📋 {} of {} records lack required fields for their entry type",
            incomplete,
            arena.len()
        );
    }
}

fn save_training_log(path: &Path, log: TrainingLog, schema: &FieldSchema) -> Result<()> {
    if log.is_empty() {
        info!("No labeled examples collected; {} left untouched", path.display());
        return Ok(());
    }
    let collected = log.len();
    let mut combined = if path.exists() {
        TrainingLog::read_csv(path, schema.vocabulary())
            .with_context(|| format!("Failed to read existing training log {}", path.display()))?
    } else {
        TrainingLog::new(schema.vocabulary())
    };
    combined
        .extend(log)
        .context("Collected examples do not fit the training log layout")?;
    combined
        .write_csv(path)
        .with_context(|| format!("Failed to write training log {}", path.display()))?;
    let (duplicates, uniques) = combined.class_counts();
    info!(
        "🏷️  Appended {} examples to {} ({} total: {} duplicate / {} unique)",
        collected,
        path.display(),
        combined.len(),
        duplicates,
        uniques
    );
    Ok(())
}

fn write_report(path: &Path, report: &DedupeReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    info!("📝 Report written to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let args = DedupeArgs::parse();
    let start_time = Instant::now();
    info!("Starting BibTeX duplicate detection");

    let mut config = DedupeConfig::from_env().context("Invalid DEDUPE_* configuration")?;
    apply_overrides(&mut config, &args);
    config
        .validate()
        .context("Invalid command-line configuration")?;
    config.log_config();

    let progress_config = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress_config.enabled, progress_config.detailed
    );

    let schema = Arc::new(FieldSchema::standard());
    let arena = Arc::new(RecordArena::load_json(&args.input)?);
    report_schema_gaps(&schema, &arena);

    let mode = if args.collect {
        let provider: Option<Box<dyn DecisionProvider>> = if args.review {
            Some(Box::new(InteractiveReviewer::new(config.review_timeout)))
        } else {
            None
        };
        PipelineMode::DataCollection { provider }
    } else {
        if args.review {
            warn!("--review only applies with --collect; ignoring");
        }
        PipelineMode::Scoring(load_classifier(
            config.model_path.as_deref(),
            schema.vocabulary(),
        )?)
    };

    let mut pipeline = DedupePipeline::new(config, Arc::clone(&schema), mode)
        .context("Failed to set up dedupe pipeline")?
        .with_progress(progress_config.clone());

    let mut report = if args.parallel {
        pipeline.run_parallel(Arc::clone(&arena)).await?
    } else {
        pipeline.run(&arena)
    };

    if let Some(path) = &args.output {
        write_report(path, &report)?;
    }
    if args.collect {
        let log = std::mem::replace(&mut report.training_log, TrainingLog::new(schema.vocabulary()));
        save_training_log(&args.training_log, log, &schema)?;
    }

    for group in report.duplicate_groups.iter().take(10) {
        info!("   • {}", group.record_ids.join(", "));
    }
    if report.duplicate_groups.len() > 10 {
        info!("   ... and {} more groups", report.duplicate_groups.len() - 10);
    }

    if progress_config.should_show_memory() {
        info!("💾 Memory in use: {} MB", get_memory_usage());
    }
    info!(
        "✅ Done in {:.2?}: {} duplicate pairs, {} groups, {} deferred",
        start_time.elapsed(),
        report.duplicate_pairs.len(),
        report.duplicate_groups.len(),
        report.deferred_pairs.len()
    );
    Ok(())
}
