// src/matching/blocking.rs
//
// Two-level blocking: records are grouped by explicit author count, then by
// author key with prefix linking. Only pairs sharing a leaf bucket are compared.

use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::matching::author_key::author_key;
use crate::models::record::RecordArena;
use crate::models::stats_models::{BlockingLevel, BlockingStats, LevelCost};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafBucket {
    pub author_count: usize,
    pub alpha_key: String,
    pub members: Vec<usize>,
}

/// An unordered pair of arena indices (`left < right`) and the leaf bucket it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidatePair {
    pub left: usize,
    pub right: usize,
    pub bucket: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CandidatePairs {
    pub pairs: Vec<CandidatePair>,
    /// Pairs seen again in a later bucket and not yielded a second time.
    pub repeated: usize,
}

#[derive(Debug, Clone)]
pub struct Blocking {
    leaves: Vec<LeafBucket>,
    excluded: Vec<usize>,
    stats: BlockingStats,
}

impl Blocking {
    pub fn leaves(&self) -> &[LeafBucket] {
        &self.leaves
    }

    pub fn excluded(&self) -> &[usize] {
        &self.excluded
    }

    pub fn stats(&self) -> &BlockingStats {
        &self.stats
    }

    /// Walks each leaf bucket in order and yields every unordered pair once.
    /// Only records sitting in more than one leaf can meet twice, so only
    /// pairs of those are remembered.
    pub fn candidate_pairs(&self) -> CandidatePairs {
        let mut memberships: HashMap<usize, usize> = HashMap::new();
        for leaf in &self.leaves {
            for &idx in &leaf.members {
                *memberships.entry(idx).or_default() += 1;
            }
        }
        let multi_leaf = |idx: usize| memberships.get(&idx).is_some_and(|&n| n > 1);

        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        let mut out = CandidatePairs::default();

        for (bucket_id, leaf) in self.leaves.iter().enumerate() {
            for (i, &a) in leaf.members.iter().enumerate() {
                for &b in &leaf.members[i + 1..] {
                    if a == b {
                        continue;
                    }
                    let (left, right) = if a < b { (a, b) } else { (b, a) };
                    let first_time =
                        !(multi_leaf(left) && multi_leaf(right)) || seen.insert((left, right));
                    if first_time {
                        out.pairs.push(CandidatePair {
                            left,
                            right,
                            bucket: bucket_id,
                        });
                    } else {
                        out.repeated += 1;
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingEngine;

impl BlockingEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn block(&self, arena: &RecordArena) -> Blocking {
        let mut fixed = Vec::new();
        let mut open_ended = Vec::new();
        let mut excluded = Vec::new();

        for (idx, record) in arena.iter().enumerate() {
            if record.authors.is_none() || record.explicit_author_count() == 0 {
                excluded.push(idx);
            } else if record.is_open_ended() {
                open_ended.push(idx);
            } else {
                fixed.push(idx);
            }
        }

        // All count keys are known before any open-ended record is placed, so
        // placement does not depend on input order.
        let mut count_buckets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &idx in &fixed {
            count_buckets
                .entry(arena[idx].explicit_author_count())
                .or_default()
                .push(idx);
        }
        let open_counts: BTreeSet<usize> = open_ended
            .iter()
            .map(|&idx| arena[idx].explicit_author_count())
            .collect();
        for count in open_counts {
            count_buckets.entry(count).or_default();
        }
        for &idx in &open_ended {
            let k = arena[idx].explicit_author_count();
            for (_, members) in count_buckets.range_mut(k..) {
                members.push(idx);
            }
        }

        let keys: Vec<String> = arena
            .iter()
            .map(|r| author_key(r.explicit_authors()))
            .collect();

        let mut leaves = Vec::new();
        for (&count, members) in &count_buckets {
            for (alpha_key, members) in partition_by_author_key(members, &keys) {
                leaves.push(LeafBucket {
                    author_count: count,
                    alpha_key,
                    members,
                });
            }
        }

        let unsplit: Vec<usize> = vec![fixed.len() + open_ended.len()];
        let by_count: Vec<usize> = count_buckets.values().map(Vec::len).collect();
        let by_key: Vec<usize> = leaves.iter().map(|l| l.members.len()).collect();

        let stats = BlockingStats {
            fixed_records: fixed.len(),
            open_ended_records: open_ended.len(),
            excluded_records: excluded.len(),
            levels: vec![
                LevelCost::from_sizes(BlockingLevel::Unsplit, &unsplit),
                LevelCost::from_sizes(BlockingLevel::ByAuthorCount, &by_count),
                LevelCost::from_sizes(BlockingLevel::ByAuthorCountAndKey, &by_key),
            ],
        };

        info!(
            "Blocking: {} fixed, {} open-ended, {} excluded records -> {} count buckets, {} leaf buckets",
            stats.fixed_records,
            stats.open_ended_records,
            stats.excluded_records,
            count_buckets.len(),
            leaves.len()
        );

        Blocking {
            leaves,
            excluded,
            stats,
        }
    }
}

/// Splits one count bucket by author key. Members are visited shortest key
/// first, so a record founds a bucket only when no other key in the count
/// bucket prefixes its own, and joins every bucket whose key prefixes (or
/// equals) its own. The outcome is the same for any input order.
fn partition_by_author_key(members: &[usize], keys: &[String]) -> BTreeMap<String, Vec<usize>> {
    let mut ordered = members.to_vec();
    ordered.sort_by_key(|&idx| (keys[idx].len(), idx));

    let mut alpha: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for idx in ordered {
        let key = keys[idx].as_str();

        let linked: Vec<&str> = key
            .char_indices()
            .map(|(end, _)| end)
            .chain(std::iter::once(key.len()))
            .map(|end| &key[..end])
            .filter(|prefix| alpha.contains_key(*prefix))
            .collect();

        if linked.is_empty() {
            alpha.insert(key.to_string(), vec![idx]);
        } else {
            debug!("Record {} links to alpha buckets {:?}", idx, linked);
            for k in linked {
                if let Some(bucket) = alpha.get_mut(k) {
                    bucket.push(idx);
                }
            }
        }
    }

    for bucket in alpha.values_mut() {
        bucket.sort_unstable();
    }
    alpha
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::{Author, Record};

    impl Blocking {
        fn leaf(&self, author_count: usize, alpha_key: &str) -> Option<&LeafBucket> {
            self.leaves
                .iter()
                .find(|l| l.author_count == author_count && l.alpha_key == alpha_key)
        }

        /// Author counts of every count bucket holding `idx`.
        fn count_buckets_of(&self, idx: usize) -> Vec<usize> {
            let counts: BTreeSet<usize> = self
                .leaves
                .iter()
                .filter(|l| l.members.contains(&idx))
                .map(|l| l.author_count)
                .collect();
            counts.into_iter().collect()
        }

        fn shares_bucket(&self, a: usize, b: usize) -> bool {
            self.leaves
                .iter()
                .any(|l| l.members.contains(&a) && l.members.contains(&b))
        }
    }

    fn record(id: &str, authors: &[(&str, &str)], open_ended: bool) -> Record {
        let mut list: Vec<Author> = authors.iter().map(|(g, s)| Author::new(*g, *s)).collect();
        if open_ended {
            list.push(Author::others());
        }
        Record::new(id, Some(list))
    }

    #[test]
    fn test_fixed_records_split_by_count_and_key() {
        let arena = RecordArena::from_records(vec![
            record("a", &[("John", "Smith")], false),
            record("b", &[("J.", "Smith")], false),
            record("c", &[("Mary", "Jones")], false),
            record("d", &[("John", "Smith"), ("Mary", "Jones")], false),
            Record::new("e", None),
        ]);
        let blocking = BlockingEngine::new().block(&arena);

        assert_eq!(blocking.leaf(1, "js").map(|l| l.members.clone()), Some(vec![0, 1]));
        assert_eq!(blocking.leaf(1, "mj").map(|l| l.members.clone()), Some(vec![2]));
        assert_eq!(blocking.leaf(2, "jsmj").map(|l| l.members.clone()), Some(vec![3]));
        assert_eq!(blocking.excluded(), &[4]);
        assert!(!blocking.shares_bucket(0, 2));
    }

    #[test]
    fn test_open_ended_records_land_in_every_larger_count_bucket() {
        // Open-ended record listed first so its placement cannot depend on
        // which count buckets happened to exist when it was seen.
        let arena = RecordArena::from_records(vec![
            record("open", &[("John", "Smith"), ("Ann", "Lee")], true),
            record("one", &[("John", "Smith")], false),
            record("two", &[("John", "Smith"), ("Ann", "Lee")], false),
            record("three", &[("John", "Smith"), ("Ann", "Lee"), ("Bo", "Ek")], false),
            record("four", &[("X", "Y"), ("Z", "W"), ("Q", "R"), ("S", "T")], false),
        ]);
        let blocking = BlockingEngine::new().block(&arena);

        assert_eq!(blocking.count_buckets_of(0), vec![2, 3, 4]);
        assert!(blocking.shares_bucket(0, 2));
        assert!(blocking.shares_bucket(0, 3));
        assert!(!blocking.shares_bucket(0, 1));
        // Key "jsal" is unrelated to "xyzwqrst".
        assert!(!blocking.shares_bucket(0, 4));
        assert_eq!(blocking.stats().open_ended_records, 1);
    }

    #[test]
    fn test_open_ended_creates_its_own_count_bucket() {
        let arena = RecordArena::from_records(vec![
            record("open", &[("John", "Smith")], true),
            record("three", &[("John", "Smith"), ("Ann", "Lee"), ("Bo", "Ek")], false),
        ]);
        let blocking = BlockingEngine::new().block(&arena);

        assert_eq!(blocking.count_buckets_of(0), vec![1, 3]);
        assert_eq!(blocking.count_buckets_of(1), vec![3]);
        assert!(blocking.shares_bucket(0, 1));
    }

    #[test]
    fn test_prefix_linking_is_bidirectional() {
        // A second author with an empty given name drops out of the key, so
        // "short" keys as a prefix of "long".
        let arena = RecordArena::from_records(vec![
            record("long", &[("John", "Smith"), ("Ann", "Lee")], false),
            record("short", &[("John", "Smith"), ("", "Lee")], false),
            record("other", &[("Kim", "Park"), ("Ann", "Lee")], false),
        ]);
        let blocking = BlockingEngine::new().block(&arena);

        assert!(blocking.shares_bucket(0, 1));
        assert!(!blocking.shares_bucket(0, 2));
        assert!(!blocking.shares_bucket(1, 2));
    }

    #[test]
    fn test_candidate_pairs_are_unique_and_bucket_bound() {
        let arena = RecordArena::from_records(vec![
            record("open", &[("John", "Smith")], true),
            record("a", &[("John", "Smith")], false),
            record("b", &[("Jane", "Smythe")], false),
            record("c", &[("John", "Smith"), ("Ann", "Lee")], false),
            record("d", &[("Jim", "Stone"), ("Al", "Lo")], false),
            record("e", &[("Mary", "Jones")], false),
        ]);
        let blocking = BlockingEngine::new().block(&arena);
        let candidates = blocking.candidate_pairs();

        let mut seen = HashSet::new();
        for pair in &candidates.pairs {
            assert!(pair.left < pair.right);
            assert!(seen.insert((pair.left, pair.right)));
            assert!(blocking.shares_bucket(pair.left, pair.right));
        }
        // Every co-resident pair is yielded.
        for leaf in blocking.leaves() {
            for &a in &leaf.members {
                for &b in &leaf.members {
                    if a < b {
                        assert!(seen.contains(&(a, b)));
                    }
                }
            }
        }
        assert!(!seen.contains(&(1, 5)));
        assert!(!seen.contains(&(2, 5)));
    }

    #[test]
    fn test_repeated_pairs_counted_once() {
        // Both open-ended records key as "js" and sit in count buckets 1 and 2;
        // in count bucket 2 their key prefixes both "jsal" and "jsbe".
        let arena = RecordArena::from_records(vec![
            record("a", &[("John", "Smith"), ("Ann", "Lee")], false),
            record("b", &[("John", "Smith"), ("Bo", "Ek")], false),
            record("open1", &[("John", "Smith")], true),
            record("open2", &[("Jo", "Sm")], true),
        ]);
        let blocking = BlockingEngine::new().block(&arena);
        let candidates = blocking.candidate_pairs();

        let occurrences = candidates
            .pairs
            .iter()
            .filter(|p| (p.left, p.right) == (2, 3))
            .count();
        assert_eq!(occurrences, 1);
        assert_eq!(candidates.repeated, 1);
        assert_eq!(candidates.pairs.len(), 6);
        assert!(blocking.shares_bucket(0, 1));
    }

    #[test]
    fn test_single_leaf_records_are_never_repeated() {
        let arena = RecordArena::from_records(vec![
            record("a", &[("John", "Smith")], false),
            record("b", &[("J.", "Smith")], false),
            record("c", &[("Jo", "Sm")], false),
            record("d", &[("Mary", "Jones"), ("Al", "Lo")], false),
            record("e", &[("Mia", "Jo"), ("Al", "Lo")], false),
        ]);
        let candidates = BlockingEngine::new().block(&arena).candidate_pairs();

        assert_eq!(candidates.repeated, 0);
        let pairs: Vec<(usize, usize)> = candidates.pairs.iter().map(|p| (p.left, p.right)).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2), (3, 4)]);
    }

    fn shared_id_pairs(arena: &RecordArena) -> BTreeSet<(String, String)> {
        let blocking = BlockingEngine::new().block(arena);
        let mut shared = BTreeSet::new();
        for a in 0..arena.len() {
            for b in 0..arena.len() {
                if a != b && blocking.shares_bucket(a, b) {
                    let (x, y) = (arena[a].id.clone(), arena[b].id.clone());
                    shared.insert(if x < y { (x, y) } else { (y, x) });
                }
            }
        }
        shared
    }

    #[test]
    fn test_prefix_linking_ignores_input_order() {
        let jsal = || record("jsal", &[("John", "Smith"), ("Ada", "Lovelace")], true);
        let js = || record("js", &[("John", "Smith")], true);
        let jsbe = || record("jsbe", &[("John", "Smith"), ("Bob", "Evans")], true);

        let orders = [
            vec![jsal(), js(), jsbe()],
            vec![js(), jsal(), jsbe()],
            vec![jsbe(), jsal(), js()],
        ];
        let results: Vec<BTreeSet<(String, String)>> = orders
            .into_iter()
            .map(|records| shared_id_pairs(&RecordArena::from_records(records)))
            .collect();

        assert!(results[0].contains(&("js".to_string(), "jsbe".to_string())));
        assert!(results[0].contains(&("js".to_string(), "jsal".to_string())));
        assert_eq!(results[0], results[1]);
        assert_eq!(results[0], results[2]);
    }

    #[test]
    fn test_level_costs() {
        let arena = RecordArena::from_records(vec![
            record("a", &[("John", "Smith")], false),
            record("b", &[("J.", "Smith")], false),
            record("c", &[("Mary", "Jones")], false),
            record("d", &[("John", "Smith"), ("Mary", "Jones")], false),
        ]);
        let blocking = BlockingEngine::new().block(&arena);
        let stats = blocking.stats();

        let unsplit = stats.level(BlockingLevel::Unsplit).unwrap();
        assert_eq!(unsplit.total_pairs, 6);
        let by_count = stats.level(BlockingLevel::ByAuthorCount).unwrap();
        assert_eq!(by_count.bucket_count, 2);
        assert_eq!(by_count.worst_case_size, 3);
        assert_eq!(by_count.total_pairs, 3);
        let by_key = stats.level(BlockingLevel::ByAuthorCountAndKey).unwrap();
        assert_eq!(by_key.bucket_count, 3);
        assert_eq!(by_key.best_case_size, 1);
        assert_eq!(by_key.worst_case_pairs, 1);
        assert_eq!(stats.max_comparisons(), 1);
    }
}
