// src/clustering/duplicate_groups.rs
use log::info;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::matching::DuplicatePair;

/// Records connected through duplicate pairs, directly or transitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub record_ids: Vec<String>,
    pub edge_count: usize,
    /// Mean classifier score over the group's edges that carry one.
    pub mean_score: Option<f64>,
}

/// Builds the duplicate graph and returns its connected components of size >= 2,
/// largest first, ties broken by first id.
pub fn group_duplicates(pairs: &[DuplicatePair]) -> Vec<DuplicateGroup> {
    let mut graph: UnGraph<String, Option<f64>> = UnGraph::new_undirected();
    let mut node_for_id: HashMap<String, NodeIndex> = HashMap::new();

    for pair in pairs {
        if pair.left_id == pair.right_id {
            continue;
        }
        let a = *node_for_id
            .entry(pair.left_id.clone())
            .or_insert_with(|| graph.add_node(pair.left_id.clone()));
        let b = *node_for_id
            .entry(pair.right_id.clone())
            .or_insert_with(|| graph.add_node(pair.right_id.clone()));
        graph.add_edge(a, b, pair.score);
    }

    // Component index of every node, filled by one DFS per component.
    let mut component_of: Vec<Option<usize>> = vec![None; graph.node_count()];
    let mut components: Vec<Vec<NodeIndex>> = Vec::new();

    for start in graph.node_indices() {
        if component_of[start.index()].is_some() {
            continue;
        }
        let id = components.len();
        let mut component = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if component_of[current.index()].is_some() {
                continue;
            }
            component_of[current.index()] = Some(id);
            component.push(current);
            for neighbor in graph.neighbors(current) {
                if component_of[neighbor.index()].is_none() {
                    stack.push(neighbor);
                }
            }
        }
        components.push(component);
    }

    // (edges, score sum, scored edges) per component.
    let mut tallies = vec![(0usize, 0.0f64, 0usize); components.len()];
    for edge in graph.edge_references() {
        let Some(id) = component_of[edge.source().index()] else {
            continue;
        };
        let tally = &mut tallies[id];
        tally.0 += 1;
        if let Some(score) = edge.weight() {
            tally.1 += score;
            tally.2 += 1;
        }
    }

    let mut groups: Vec<DuplicateGroup> = components
        .iter()
        .zip(tallies)
        .filter(|(component, _)| component.len() >= 2)
        .map(|(component, (edge_count, score_sum, scored_edges))| {
            let mut record_ids: Vec<String> = component.iter().map(|&n| graph[n].clone()).collect();
            record_ids.sort();
            DuplicateGroup {
                record_ids,
                edge_count,
                mean_score: (scored_edges > 0).then(|| score_sum / scored_edges as f64),
            }
        })
        .collect();

    groups.sort_by(|a, b| {
        b.record_ids
            .len()
            .cmp(&a.record_ids.len())
            .then_with(|| a.record_ids.first().cmp(&b.record_ids.first()))
    });

    info!(
        "Duplicate graph: {} records, {} edges, {} components, {} groups of 2+",
        graph.node_count(),
        graph.edge_count(),
        connected_components(&graph),
        groups.len()
    );

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::matching::VerdictSource;

    fn pair(a: &str, b: &str, score: Option<f64>) -> DuplicatePair {
        DuplicatePair {
            left_id: a.into(),
            right_id: b.into(),
            score,
            source: VerdictSource::Classifier,
        }
    }

    #[test]
    fn test_grouping_is_transitive() {
        let groups = group_duplicates(&[
            pair("a", "b", Some(0.9)),
            pair("c", "b", Some(0.7)),
            pair("x", "y", None),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].record_ids, vec!["a", "b", "c"]);
        assert_eq!(groups[0].edge_count, 2);
        let mean = groups[0].mean_score.unwrap();
        assert!((mean - 0.8).abs() < 1e-9);
        assert_eq!(groups[1].record_ids, vec!["x", "y"]);
        assert_eq!(groups[1].mean_score, None);
    }

    #[test]
    fn test_self_pairs_and_empty_input() {
        assert!(group_duplicates(&[]).is_empty());
        assert!(group_duplicates(&[pair("a", "a", Some(0.9))]).is_empty());
    }

    #[test]
    fn test_grouping_many_pairs() {
        let mut pairs = Vec::new();
        // 2000 disjoint two-record groups.
        for i in 0..2000 {
            pairs.push(pair(&format!("p{i:05}a"), &format!("p{i:05}b"), Some(0.5)));
        }
        // One chain of 1001 records, with every link reported twice.
        for i in 0..1000 {
            let (a, b) = (format!("c{i:05}"), format!("c{:05}", i + 1));
            pairs.push(pair(&a, &b, None));
            pairs.push(pair(&b, &a, Some(1.0)));
        }

        let groups = group_duplicates(&pairs);

        assert_eq!(groups.len(), 2001);
        assert_eq!(groups[0].record_ids.len(), 1001);
        assert_eq!(groups[0].edge_count, 2000);
        assert_eq!(groups[0].mean_score, Some(1.0));
        assert!(groups[1..]
            .iter()
            .all(|g| g.record_ids.len() == 2 && g.edge_count == 1 && g.mean_score == Some(0.5)));
        let total_edges: usize = groups.iter().map(|g| g.edge_count).sum();
        assert_eq!(total_edges, 4000);
    }
}
