// src/matching/manager.rs - Runs blocking, shallow gating, deep comparison and classification
use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::classifier::decision::{Decision, DecisionProvider, ReviewContext};
use crate::classifier::model::ClassifierModel;
use crate::classifier::training_log::TrainingLog;
use crate::clustering::duplicate_groups::group_duplicates;
use crate::matching::blocking::{BlockingEngine, CandidatePair};
use crate::matching::deep::DeepComparator;
use crate::matching::phonetic::PhoneticEncoder;
use crate::matching::shallow::ShallowScorer;
use crate::models::matching::{DeferredPair, DistanceVector, DuplicatePair, Label, VerdictSource};
use crate::models::record::RecordArena;
use crate::models::schema::{FieldSchema, FieldVocabulary};
use crate::models::stats_models::{BlockingStats, DedupeReport, MatchingStats};
use crate::utils::config::DedupeConfig;
use crate::utils::error::ConfigError;
use crate::utils::get_memory_usage;
use crate::utils::progress_bars::logging::{DedupeLogger, RunKind};
use crate::utils::progress_bars::progress_config::ProgressConfig;

const PROGRESS_MESSAGE_INTERVAL: u64 = 500;

pub enum PipelineMode {
    /// Promoted pairs are labeled by the classifier.
    Scoring(ClassifierModel),
    /// Promoted pairs are auto-labeled by summed error, the gray zone goes to
    /// the provider, and every label is written to the training log.
    DataCollection {
        provider: Option<Box<dyn DecisionProvider>>,
    },
}

impl PipelineMode {
    fn kind(&self) -> RunKind {
        match self {
            PipelineMode::Scoring(_) => RunKind::Scoring,
            PipelineMode::DataCollection { .. } => RunKind::DataCollection,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PipelineMode::Scoring(_) => "scoring",
            PipelineMode::DataCollection { .. } => "data_collection",
        }
    }

    fn describe(&self) -> String {
        match self {
            PipelineMode::Scoring(model) => model.describe(),
            PipelineMode::DataCollection { provider: Some(_) } => {
                "data collection with reviewer".to_string()
            }
            PipelineMode::DataCollection { provider: None } => {
                "data collection, gray zone deferred".to_string()
            }
        }
    }
}

/// Shallow scorer and deep comparator for one worker. Each parallel chunk owns
/// its own, so the phonetic cache is never shared between threads.
struct PairEvaluator {
    scorer: ShallowScorer,
    comparator: DeepComparator,
    threshold: f64,
}

impl PairEvaluator {
    fn new(config: &DedupeConfig, vocabulary: FieldVocabulary) -> Self {
        Self {
            scorer: ShallowScorer::new(PhoneticEncoder::new(
                config.soundex_length,
                config.phonetic_cache_size,
            )),
            comparator: DeepComparator::new(vocabulary),
            threshold: config.shallow_deep_threshold,
        }
    }

    /// Shallow-scores the pair and deep-compares it when promoted. Returns
    /// `None` for rejected and skipped pairs.
    fn evaluate(
        &mut self,
        arena: &RecordArena,
        pair: &CandidatePair,
        stats: &mut MatchingStats,
    ) -> Option<DistanceVector> {
        let left = &arena[pair.left];
        let right = &arena[pair.right];
        stats.shallow_comparisons += 1;

        let shallow = match self.scorer.score(left, right) {
            Ok(score) => score,
            Err(e) => {
                stats.skipped_pairs += 1;
                warn!("Skipping pair ({}, {}): {}", left.id, right.id, e);
                return None;
            }
        };

        if !shallow.is_promoted(self.threshold) {
            stats.rejected += 1;
            stats.shallow_histogram.record(shallow.product());
            return None;
        }

        stats.promotions += 1;
        if let Some(slot) = stats.promotions_per_bucket.get_mut(pair.bucket) {
            *slot += 1;
        }
        stats.deep_comparisons += 1;
        Some(self.comparator.compare(left, right))
    }

    fn record_cache_stats(&self, stats: &mut MatchingStats) {
        let encoder = self.scorer.encoder();
        stats.phonetic_cache_hits += encoder.hits;
        stats.phonetic_cache_misses += encoder.misses;
    }
}

fn tick(pb: Option<&ProgressBar>, progress: &ProgressConfig, stats: &MatchingStats) {
    let Some(pb) = pb else { return };
    pb.inc(1);
    if progress.should_show_detailed() && pb.position() % PROGRESS_MESSAGE_INTERVAL == 0 {
        let mut message = format!(
            "{} promoted, {} rejected",
            stats.promotions, stats.rejected
        );
        if progress.should_show_memory() {
            message.push_str(&format!(" | {} MB", get_memory_usage()));
        }
        pb.set_message(message);
    }
}

/// Classifier verdicts for a slice of candidate pairs. Used both for the
/// sequential run and for every parallel chunk.
fn score_pairs(
    arena: &RecordArena,
    pairs: &[CandidatePair],
    model: &ClassifierModel,
    evaluator: &mut PairEvaluator,
    stats: &mut MatchingStats,
    pb: Option<&ProgressBar>,
    progress: &ProgressConfig,
) -> Vec<DuplicatePair> {
    let mut duplicates = Vec::new();
    for pair in pairs {
        if let Some(distances) = evaluator.evaluate(arena, pair, stats) {
            let prediction = model.predict(&distances, evaluator.comparator.vocabulary());
            if prediction.label.is_duplicate() {
                stats.predicted_duplicates += 1;
                duplicates.push(DuplicatePair {
                    left_id: arena[pair.left].id.clone(),
                    right_id: arena[pair.right].id.clone(),
                    score: Some(prediction.score),
                    source: VerdictSource::Classifier,
                });
            } else {
                stats.predicted_unique += 1;
            }
        }
        tick(pb, progress, stats);
    }
    duplicates
}

struct CollectionOutcome {
    duplicates: Vec<DuplicatePair>,
    deferred: Vec<DeferredPair>,
    training_log: TrainingLog,
}

#[allow(clippy::too_many_arguments)]
fn collect_labels(
    arena: &RecordArena,
    pairs: &[CandidatePair],
    config: &DedupeConfig,
    mut provider: Option<&mut Box<dyn DecisionProvider>>,
    evaluator: &mut PairEvaluator,
    stats: &mut MatchingStats,
    pb: Option<&ProgressBar>,
    progress: &ProgressConfig,
) -> CollectionOutcome {
    let vocabulary = evaluator.comparator.vocabulary().clone();
    let mut outcome = CollectionOutcome {
        duplicates: Vec::new(),
        deferred: Vec::new(),
        training_log: TrainingLog::new(&vocabulary),
    };
    let mut aborted = false;
    let total = pairs.len();

    for (position, pair) in pairs.iter().enumerate() {
        let Some(distances) = evaluator.evaluate(arena, pair, stats) else {
            tick(pb, progress, stats);
            continue;
        };
        let left = &arena[pair.left];
        let right = &arena[pair.right];
        let summed_error = distances.summed_error();

        let (label, source) = if summed_error <= config.low_error_cutoff {
            stats.auto_labeled_duplicate += 1;
            (Some(Label::Duplicate), VerdictSource::AutoLabeled)
        } else if summed_error >= config.high_error_cutoff {
            stats.auto_labeled_unique += 1;
            (Some(Label::Unique), VerdictSource::AutoLabeled)
        } else {
            let decision = match provider.as_mut() {
                Some(provider) if !aborted => {
                    let context = ReviewContext {
                        left_id: &left.id,
                        right_id: &right.id,
                        summed_error,
                        shared_fields: evaluator.comparator.shared_fields(left, right),
                        position: position + 1,
                        total,
                    };
                    match pb {
                        Some(pb) => pb.suspend(|| provider.decide(&context)),
                        None => provider.decide(&context),
                    }
                }
                _ => Decision::Defer,
            };
            match decision {
                Decision::Label(label) => {
                    stats.reviewed += 1;
                    (Some(label), VerdictSource::Reviewed)
                }
                Decision::Defer => (None, VerdictSource::Reviewed),
                Decision::Abort => {
                    info!("🛑 Review aborted; remaining gray-zone pairs will be deferred");
                    aborted = true;
                    (None, VerdictSource::Reviewed)
                }
            }
        };

        match label {
            Some(label) => {
                outcome.training_log.record(label, &distances, &vocabulary);
                if label.is_duplicate() {
                    outcome.duplicates.push(DuplicatePair {
                        left_id: left.id.clone(),
                        right_id: right.id.clone(),
                        score: None,
                        source,
                    });
                }
            }
            None => {
                stats.deferred += 1;
                debug!(
                    "Deferred pair ({}, {}) with summed error {:.3}",
                    left.id, right.id, summed_error
                );
                outcome.deferred.push(DeferredPair {
                    left_id: left.id.clone(),
                    right_id: right.id.clone(),
                    summed_error,
                });
            }
        }
        tick(pb, progress, stats);
    }
    outcome
}

pub struct DedupePipeline {
    config: DedupeConfig,
    schema: Arc<FieldSchema>,
    mode: PipelineMode,
    progress: ProgressConfig,
}

impl DedupePipeline {
    /// Validates the configuration and, in scoring mode, that the classifier
    /// has one weight per vocabulary field plus the bias.
    pub fn new(
        config: DedupeConfig,
        schema: Arc<FieldSchema>,
        mode: PipelineMode,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if let PipelineMode::Scoring(model) = &mode {
            let expected = schema.vocabulary().len() + 1;
            let actual = model.weights().len();
            if actual != expected {
                return Err(ConfigError::WeightLength { expected, actual });
            }
        }
        Ok(Self {
            config,
            schema,
            mode,
            progress: ProgressConfig::disabled(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressConfig) -> Self {
        self.progress = progress;
        self
    }

    /// Single-threaded run over the arena.
    pub fn run(&mut self, arena: &RecordArena) -> DedupeReport {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let logger = DedupeLogger::new(self.mode.kind());
        logger.log_start(
            &run_id,
            arena.len(),
            arena.skipped_count(),
            &self.mode.describe(),
        );

        logger.log_phase("Blocking", None);
        let blocking = BlockingEngine::new().block(arena);
        logger.log_blocking(blocking.stats());
        let candidates = blocking.candidate_pairs();
        let bucket_count = blocking.leaves().len();
        logger.log_pair_generation(candidates.pairs.len(), candidates.repeated, bucket_count);

        let mut stats = MatchingStats::with_bucket_count(bucket_count);
        stats.max_comparisons = blocking.stats().max_comparisons();
        stats.repeated_pairs = candidates.repeated;

        logger.log_phase("Pair evaluation", Some(self.mode.name()));
        let pb = self
            .progress
            .pair_bar(candidates.pairs.len() as u64, "Evaluating pairs");
        let mut evaluator = PairEvaluator::new(&self.config, self.schema.vocabulary().clone());

        let (duplicates, deferred, training_log) = match &mut self.mode {
            PipelineMode::Scoring(model) => {
                let duplicates = score_pairs(
                    arena,
                    &candidates.pairs,
                    model,
                    &mut evaluator,
                    &mut stats,
                    pb.as_ref(),
                    &self.progress,
                );
                (duplicates, Vec::new(), TrainingLog::new(self.schema.vocabulary()))
            }
            PipelineMode::DataCollection { provider } => {
                let outcome = collect_labels(
                    arena,
                    &candidates.pairs,
                    &self.config,
                    provider.as_mut(),
                    &mut evaluator,
                    &mut stats,
                    pb.as_ref(),
                    &self.progress,
                );
                (outcome.duplicates, outcome.deferred, outcome.training_log)
            }
        };
        evaluator.record_cache_stats(&mut stats);
        if let Some(pb) = pb {
            pb.finish_with_message("Pair evaluation complete");
        }

        self.finish(
            &logger,
            run_id,
            started_at,
            arena,
            blocking.stats().clone(),
            stats,
            duplicates,
            deferred,
            training_log,
        )
    }

    /// Scores candidate pairs in chunks on blocking worker threads, at most
    /// `worker_count` at a time. Data-collection runs need a single reviewer
    /// and fall back to `run`.
    pub async fn run_parallel(&mut self, arena: Arc<RecordArena>) -> Result<DedupeReport> {
        let model = match &self.mode {
            PipelineMode::Scoring(model) => Some(Arc::new(model.clone())),
            PipelineMode::DataCollection { .. } => None,
        };
        let Some(model) = model else {
            info!("Data collection runs sequentially; ignoring parallel request");
            return Ok(self.run(&arena));
        };

        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let logger = DedupeLogger::new(self.mode.kind());
        logger.log_start(
            &run_id,
            arena.len(),
            arena.skipped_count(),
            &self.mode.describe(),
        );

        logger.log_phase("Blocking", None);
        let blocking = BlockingEngine::new().block(&arena);
        logger.log_blocking(blocking.stats());
        let candidates = blocking.candidate_pairs();
        let bucket_count = blocking.leaves().len();
        logger.log_pair_generation(candidates.pairs.len(), candidates.repeated, bucket_count);

        let mut stats = MatchingStats::with_bucket_count(bucket_count);
        stats.max_comparisons = blocking.stats().max_comparisons();
        stats.repeated_pairs = candidates.repeated;

        let chunk_size = self.config.chunk_size;
        let workers = self.config.worker_count;
        let chunks: Vec<Vec<CandidatePair>> = candidates
            .pairs
            .chunks(chunk_size)
            .map(<[CandidatePair]>::to_vec)
            .collect();
        let total_chunks = chunks.len();
        logger.log_batch_processing_start(candidates.pairs.len(), chunk_size, workers);

        let pb = self
            .progress
            .pair_bar(candidates.pairs.len() as u64, "Scoring pairs");

        let results = stream::iter(chunks)
            .map(|chunk| {
                let arena = Arc::clone(&arena);
                let model = Arc::clone(&model);
                let config = self.config.clone();
                let vocabulary = self.schema.vocabulary().clone();
                let progress = self.progress.clone();
                let pb = pb.clone();
                tokio::task::spawn_blocking(move || {
                    let mut evaluator = PairEvaluator::new(&config, vocabulary);
                    let mut chunk_stats = MatchingStats::with_bucket_count(bucket_count);
                    let duplicates = score_pairs(
                        &arena,
                        &chunk,
                        &model,
                        &mut evaluator,
                        &mut chunk_stats,
                        pb.as_ref(),
                        &progress,
                    );
                    evaluator.record_cache_stats(&mut chunk_stats);
                    (chunk.len(), chunk_stats, duplicates)
                })
            })
            .buffer_unordered(workers)
            .collect::<Vec<_>>()
            .await;

        let mut duplicates = Vec::new();
        for (done, result) in results.into_iter().enumerate() {
            let (pairs_in_chunk, chunk_stats, chunk_duplicates) =
                result.context("pair scoring worker failed")?;
            stats.merge(&chunk_stats);
            duplicates.extend(chunk_duplicates);
            logger.log_batch_progress(done + 1, total_chunks, pairs_in_chunk);
        }
        if let Some(pb) = pb {
            pb.finish_with_message("Pair scoring complete");
        }

        Ok(self.finish(
            &logger,
            run_id,
            started_at,
            &arena,
            blocking.stats().clone(),
            stats,
            duplicates,
            Vec::new(),
            TrainingLog::new(self.schema.vocabulary()),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        logger: &DedupeLogger,
        run_id: String,
        started_at: chrono::DateTime<Utc>,
        arena: &RecordArena,
        blocking: BlockingStats,
        stats: MatchingStats,
        mut duplicates: Vec<DuplicatePair>,
        mut deferred: Vec<DeferredPair>,
        training_log: TrainingLog,
    ) -> DedupeReport {
        logger.log_phase("Grouping duplicates", None);
        duplicates.sort_by(|a, b| {
            a.left_id
                .cmp(&b.left_id)
                .then_with(|| a.right_id.cmp(&b.right_id))
        });
        deferred.sort_by(|a, b| {
            a.left_id
                .cmp(&b.left_id)
                .then_with(|| a.right_id.cmp(&b.right_id))
        });
        let groups = group_duplicates(&duplicates);

        logger.log_histogram(&stats.shallow_histogram);
        logger.log_completion(&stats, duplicates.len(), groups.len());
        logger.log_performance_summary(&stats);

        let (promotion_best_case, promotion_worst_case) = stats.promotion_extremes();
        DedupeReport {
            run_id,
            mode: self.mode.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            records_total: arena.len(),
            records_skipped_at_load: arena.skipped_count(),
            blocking,
            matching: stats,
            promotion_best_case,
            promotion_worst_case,
            duplicate_pairs: duplicates,
            duplicate_groups: groups,
            deferred_pairs: deferred,
            training_log,
        }
    }
}
