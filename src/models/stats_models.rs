// src/models/stats_models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::training_log::TrainingLog;
use crate::clustering::duplicate_groups::DuplicateGroup;
use crate::models::matching::{DeferredPair, DuplicatePair};

/// Upper end of the shallow score scale (edit average times phonetic average).
pub const SHALLOW_SCORE_MAX: f64 = 4.0;
pub const HISTOGRAM_BINS: usize = 20;

/// Number of unordered pairs among `n` items.
pub fn pair_count(n: usize) -> u64 {
    let n = n as u64;
    n * n.saturating_sub(1) / 2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingLevel {
    Unsplit,
    ByAuthorCount,
    ByAuthorCountAndKey,
}

impl BlockingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockingLevel::Unsplit => "unsplit",
            BlockingLevel::ByAuthorCount => "by_author_count",
            BlockingLevel::ByAuthorCountAndKey => "by_author_count_and_key",
        }
    }
}

/// Comparison cost of one blocking level. Best and worst case describe a single
/// bucket (smallest and largest); `total_pairs` is the budget across all buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCost {
    pub level: BlockingLevel,
    pub bucket_count: usize,
    pub best_case_size: usize,
    pub best_case_pairs: u64,
    pub worst_case_size: usize,
    pub worst_case_pairs: u64,
    pub total_pairs: u64,
}

impl LevelCost {
    pub fn from_sizes(level: BlockingLevel, sizes: &[usize]) -> Self {
        let best = sizes.iter().copied().min().unwrap_or(0);
        let worst = sizes.iter().copied().max().unwrap_or(0);
        Self {
            level,
            bucket_count: sizes.len(),
            best_case_size: best,
            best_case_pairs: pair_count(best),
            worst_case_size: worst,
            worst_case_pairs: pair_count(worst),
            total_pairs: sizes.iter().map(|&s| pair_count(s)).sum(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockingStats {
    pub fixed_records: usize,
    pub open_ended_records: usize,
    pub excluded_records: usize,
    pub levels: Vec<LevelCost>,
}

impl BlockingStats {
    pub fn level(&self, level: BlockingLevel) -> Option<&LevelCost> {
        self.levels.iter().find(|l| l.level == level)
    }

    /// Pair budget of the finest blocking level.
    pub fn max_comparisons(&self) -> u64 {
        self.level(BlockingLevel::ByAuthorCountAndKey)
            .map_or(0, |l| l.total_pairs)
    }
}

/// Fixed-width histogram of rejected shallow scores over [0, 4].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistogram {
    pub bins: Vec<usize>,
}

impl Default for ScoreHistogram {
    fn default() -> Self {
        Self {
            bins: vec![0; HISTOGRAM_BINS],
        }
    }
}

impl ScoreHistogram {
    pub fn record(&mut self, score: f64) {
        let scaled = (score / SHALLOW_SCORE_MAX * HISTOGRAM_BINS as f64).floor();
        let bin = if scaled.is_nan() || scaled < 0.0 {
            0
        } else {
            (scaled as usize).min(HISTOGRAM_BINS - 1)
        };
        self.bins[bin] += 1;
    }

    pub fn total(&self) -> usize {
        self.bins.iter().sum()
    }

    pub fn bin_width(&self) -> f64 {
        SHALLOW_SCORE_MAX / HISTOGRAM_BINS as f64
    }

    pub fn merge(&mut self, other: &ScoreHistogram) {
        for (mine, theirs) in self.bins.iter_mut().zip(&other.bins) {
            *mine += theirs;
        }
    }
}

/// Counters for one pass over the candidate pairs. Chunks processed in
/// parallel each produce one of these and are merged at the end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingStats {
    pub max_comparisons: u64,
    pub repeated_pairs: usize,
    pub shallow_comparisons: usize,
    pub skipped_pairs: usize,
    pub rejected: usize,
    pub promotions: usize,
    pub deep_comparisons: usize,
    pub predicted_duplicates: usize,
    pub predicted_unique: usize,
    pub auto_labeled_duplicate: usize,
    pub auto_labeled_unique: usize,
    pub reviewed: usize,
    pub deferred: usize,
    pub shallow_histogram: ScoreHistogram,
    pub promotions_per_bucket: Vec<usize>,
    pub phonetic_cache_hits: usize,
    pub phonetic_cache_misses: usize,
}

impl MatchingStats {
    pub fn with_bucket_count(bucket_count: usize) -> Self {
        Self {
            promotions_per_bucket: vec![0; bucket_count],
            ..Default::default()
        }
    }

    pub fn merge(&mut self, other: &MatchingStats) {
        self.repeated_pairs += other.repeated_pairs;
        self.shallow_comparisons += other.shallow_comparisons;
        self.skipped_pairs += other.skipped_pairs;
        self.rejected += other.rejected;
        self.promotions += other.promotions;
        self.deep_comparisons += other.deep_comparisons;
        self.predicted_duplicates += other.predicted_duplicates;
        self.predicted_unique += other.predicted_unique;
        self.auto_labeled_duplicate += other.auto_labeled_duplicate;
        self.auto_labeled_unique += other.auto_labeled_unique;
        self.reviewed += other.reviewed;
        self.deferred += other.deferred;
        self.shallow_histogram.merge(&other.shallow_histogram);
        if self.promotions_per_bucket.len() < other.promotions_per_bucket.len() {
            self.promotions_per_bucket
                .resize(other.promotions_per_bucket.len(), 0);
        }
        for (mine, theirs) in self
            .promotions_per_bucket
            .iter_mut()
            .zip(&other.promotions_per_bucket)
        {
            *mine += theirs;
        }
        self.phonetic_cache_hits += other.phonetic_cache_hits;
        self.phonetic_cache_misses += other.phonetic_cache_misses;
    }

    /// (fewest, most) promotions seen in a single leaf bucket.
    pub fn promotion_extremes(&self) -> (usize, usize) {
        let best = self.promotions_per_bucket.iter().copied().min().unwrap_or(0);
        let worst = self.promotions_per_bucket.iter().copied().max().unwrap_or(0);
        (best, worst)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupeReport {
    pub run_id: String,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records_total: usize,
    pub records_skipped_at_load: usize,
    pub blocking: BlockingStats,
    pub matching: MatchingStats,
    pub promotion_best_case: usize,
    pub promotion_worst_case: usize,
    pub duplicate_pairs: Vec<DuplicatePair>,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub deferred_pairs: Vec<DeferredPair>,
    #[serde(skip)]
    pub training_log: TrainingLog,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_count() {
        assert_eq!(pair_count(0), 0);
        assert_eq!(pair_count(1), 0);
        assert_eq!(pair_count(2), 1);
        assert_eq!(pair_count(5), 10);
    }

    #[test]
    fn test_level_cost_uses_bucket_extremes_and_global_sum() {
        let cost = LevelCost::from_sizes(BlockingLevel::ByAuthorCount, &[2, 5, 3]);
        assert_eq!(cost.bucket_count, 3);
        assert_eq!(cost.best_case_size, 2);
        assert_eq!(cost.best_case_pairs, 1);
        assert_eq!(cost.worst_case_size, 5);
        assert_eq!(cost.worst_case_pairs, 10);
        assert_eq!(cost.total_pairs, 1 + 10 + 3);

        let empty = LevelCost::from_sizes(BlockingLevel::Unsplit, &[]);
        assert_eq!(empty.total_pairs, 0);
        assert_eq!(empty.worst_case_size, 0);
    }

    #[test]
    fn test_histogram_binning() {
        let mut hist = ScoreHistogram::default();
        hist.record(0.0);
        hist.record(0.19);
        hist.record(0.3);
        hist.record(3.99);
        hist.record(4.0);
        hist.record(-1.0);
        assert_eq!(hist.bins[0], 3);
        assert_eq!(hist.bins[1], 1);
        assert_eq!(hist.bins[19], 2);
        assert_eq!(hist.total(), 6);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = MatchingStats::with_bucket_count(2);
        a.shallow_comparisons = 3;
        a.promotions_per_bucket[0] = 1;
        let mut b = MatchingStats::with_bucket_count(2);
        b.shallow_comparisons = 4;
        b.promotions_per_bucket[1] = 2;
        b.shallow_histogram.record(1.0);

        a.merge(&b);
        assert_eq!(a.shallow_comparisons, 7);
        assert_eq!(a.promotions_per_bucket, vec![1, 2]);
        assert_eq!(a.shallow_histogram.total(), 1);
        assert_eq!(a.promotion_extremes(), (1, 2));
    }
}
