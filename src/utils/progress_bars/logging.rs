// src/utils/progress_bars/logging.rs - Logging helpers for dedupe runs
use log::{debug, info, warn};
use std::time::Instant;

use crate::models::stats_models::{BlockingStats, MatchingStats, ScoreHistogram};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Scoring,
    DataCollection,
}

#[derive(Clone)]
pub struct DedupeLogger {
    tag: &'static str,
    emoji: &'static str,
    start_time: Instant,
}

impl DedupeLogger {
    pub fn new(kind: RunKind) -> Self {
        let (tag, emoji) = match kind {
            RunKind::Scoring => ("SCORING", "📚"),
            RunKind::DataCollection => ("COLLECT", "🏷️"),
        };
        Self {
            tag,
            emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, run_id: &str, records: usize, skipped_at_load: usize, classifier: &str) {
        info!(
            "[{}] {} 🚀 Starting dedupe run {} over {} records ({} skipped at load)",
            self.tag, self.emoji, run_id, records, skipped_at_load
        );
        info!("[{}] {} ⚙️  Classifier: {}", self.tag, self.emoji, classifier);
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        match details {
            Some(details) => info!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.tag,
                self.emoji,
                phase,
                details,
                elapsed.as_secs_f32()
            ),
            None => info!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.tag,
                self.emoji,
                phase,
                elapsed.as_secs_f32()
            ),
        }
    }

    pub fn log_blocking(&self, stats: &BlockingStats) {
        info!(
            "[{}] {} 🧱 Records: {} fixed author lists, {} open-ended, {} without authors",
            self.tag, self.emoji, stats.fixed_records, stats.open_ended_records, stats.excluded_records
        );
        for level in &stats.levels {
            info!(
                "[{}] {} 📊 {:<24} {:>6} buckets | best {} records ({} pairs) | worst {} records ({} pairs) | budget {} pairs",
                self.tag,
                self.emoji,
                level.level.as_str(),
                level.bucket_count,
                level.best_case_size,
                level.best_case_pairs,
                level.worst_case_size,
                level.worst_case_pairs,
                level.total_pairs
            );
        }
    }

    pub fn log_pair_generation(&self, unique_pairs: usize, repeated: usize, leaf_buckets: usize) {
        info!(
            "[{}] {} 📈 Candidate pairs: {} unique from {} leaf buckets ({} repeats dropped)",
            self.tag, self.emoji, unique_pairs, leaf_buckets, repeated
        );
    }

    pub fn log_batch_processing_start(&self, total_pairs: usize, chunk_size: usize, workers: usize) {
        let chunk_count = (total_pairs + chunk_size - 1) / chunk_size.max(1);
        info!(
            "[{}] {} ⚙️  Processing {} pairs in {} chunks (chunk size: {}, workers: {})",
            self.tag, self.emoji, total_pairs, chunk_count, chunk_size, workers
        );
    }

    pub fn log_batch_progress(&self, chunk_num: usize, total_chunks: usize, pairs_in_chunk: usize) {
        if chunk_num % 5 == 0 || chunk_num == 1 || chunk_num == total_chunks {
            info!(
                "[{}] {} 📦 Finished chunk {}/{} ({} pairs)",
                self.tag, self.emoji, chunk_num, total_chunks, pairs_in_chunk
            );
        }
    }

    pub fn log_histogram(&self, histogram: &ScoreHistogram) {
        let width = histogram.bin_width();
        for (i, count) in histogram.bins.iter().enumerate() {
            if *count > 0 {
                debug!(
                    "[{}] {} shallow score [{:.1}, {:.1}): {}",
                    self.tag,
                    self.emoji,
                    i as f64 * width,
                    (i + 1) as f64 * width,
                    count
                );
            }
        }
    }

    pub fn log_completion(&self, stats: &MatchingStats, duplicate_pairs: usize, groups: usize) {
        let duration = self.start_time.elapsed();
        info!(
            "[{}] {} 🎉 COMPLETED in {:.2?}: {} duplicate pairs in {} groups",
            self.tag,
            self.emoji,
            duration,
            duplicate_pairs,
            groups
        );
        info!(
            "[{}] {} 📊 Budget {} pairs | {} shallow | {} rejected | {} promoted | {} deep",
            self.tag,
            self.emoji,
            stats.max_comparisons,
            stats.shallow_comparisons,
            stats.rejected,
            stats.promotions,
            stats.deep_comparisons
        );
        let (best, worst) = stats.promotion_extremes();
        info!(
            "[{}] {} 🎯 Promotions per leaf bucket: best {} | worst {}",
            self.tag, self.emoji, best, worst
        );
        if stats.auto_labeled_duplicate + stats.auto_labeled_unique + stats.reviewed + stats.deferred > 0 {
            info!(
                "[{}] {} 🏷️  Auto-labeled {} duplicate / {} unique | {} reviewed | {} deferred",
                self.tag,
                self.emoji,
                stats.auto_labeled_duplicate,
                stats.auto_labeled_unique,
                stats.reviewed,
                stats.deferred
            );
        } else {
            info!(
                "[{}] {} 🧮 Classifier: {} duplicate / {} unique",
                self.tag, self.emoji, stats.predicted_duplicates, stats.predicted_unique
            );
        }
    }

    pub fn log_performance_summary(&self, stats: &MatchingStats) {
        let lookups = stats.phonetic_cache_hits + stats.phonetic_cache_misses;
        if lookups > 0 {
            info!(
                "[{}] {} 💾 Phonetic cache: {} hits, {} misses ({:.1}% hit rate)",
                self.tag,
                self.emoji,
                stats.phonetic_cache_hits,
                stats.phonetic_cache_misses,
                stats.phonetic_cache_hits as f64 / lookups as f64 * 100.0
            );
        }
        if stats.skipped_pairs > 0 {
            warn!(
                "[{}] {} ⚠️  {} pairs skipped because of scoring errors",
                self.tag, self.emoji, stats.skipped_pairs
            );
        }
    }
}
