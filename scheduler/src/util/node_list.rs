use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use crate::api::{FitError, FitErrors, NodeInfo, TaskInfo};
use crate::config::SchedTuning;
use crate::framework::Session;

/// Baseline percentage the adaptive formula decays from.
const DEFAULT_PERCENTAGE_TO_SCORE: i64 = 50;

/// Where the previous scan stopped; rotating the start point keeps any
/// single node from being systematically starved by sampling.
static LAST_PROCESSED_NODE_INDEX: AtomicUsize = AtomicUsize::new(0);

/// How many feasible nodes a predicate pass should try to collect.
///
/// Small clusters are scanned fully; large ones are sampled by a percentage
/// that shrinks adaptively with cluster size when the configured value is
/// non-positive.
pub fn feasible_nodes_to_find(num_all: usize, tuning: &SchedTuning) -> usize {
    let num_all = num_all as i64;
    if num_all <= tuning.min_nodes_to_find as i64 || tuning.percentage_of_nodes_to_find >= 100 {
        return num_all as usize;
    }

    let mut percentage = tuning.percentage_of_nodes_to_find as i64;
    if percentage <= 0 {
        percentage = DEFAULT_PERCENTAGE_TO_SCORE - num_all / 125;
        if percentage < tuning.min_percentage_of_nodes_to_find as i64 {
            percentage = tuning.min_percentage_of_nodes_to_find as i64;
        }
    }

    let mut num_nodes = num_all * percentage / 100;
    if num_nodes < tuning.min_nodes_to_find as i64 {
        num_nodes = tuning.min_nodes_to_find as i64;
    }
    num_nodes as usize
}

/// Scan nodes (starting where the last scan stopped) and collect snapshots
/// of those that pass the predicate, until the sampling target is met.
///
/// Rejections are gathered into a single `FitErrors` for the task.
pub fn predicate_nodes<F>(
    task: &TaskInfo,
    names: &[String],
    ssn: &Session,
    predicate: F,
) -> (Vec<NodeInfo>, FitErrors)
where
    F: Fn(&TaskInfo, &NodeInfo) -> Result<(), FitError>,
{
    let mut feasible = Vec::new();
    let mut fit_errors = FitErrors::new();
    if names.is_empty() {
        return (feasible, fit_errors);
    }

    let target = feasible_nodes_to_find(names.len(), &ssn.tuning);
    let start = LAST_PROCESSED_NODE_INDEX.load(AtomicOrdering::Relaxed) % names.len();

    let mut scanned = 0;
    for i in 0..names.len() {
        if feasible.len() >= target {
            break;
        }
        let name = &names[(start + i) % names.len()];
        scanned += 1;

        let Some(node) = ssn.nodes.get(name).map(|n| n.value().clone()) else {
            continue;
        };
        match predicate(task, &node) {
            Ok(()) => feasible.push(node),
            Err(err) => fit_errors.push(err),
        }
    }

    LAST_PROCESSED_NODE_INDEX.store((start + scanned) % names.len(), AtomicOrdering::Relaxed);
    (feasible, fit_errors)
}

/// Score the candidate nodes for a task: batch order functions first, then
/// per-node map functions, then the session's reduce pass.
pub fn prioritize_nodes(
    task: &TaskInfo,
    nodes: &[NodeInfo],
    ssn: &Session,
) -> HashMap<String, f64> {
    let mut scores = ssn.batch_node_order(task, nodes);
    for node in nodes {
        *scores.entry(node.name.clone()).or_insert(0.0) += ssn.node_order_map(task, node);
    }
    ssn.node_order_reduce(&mut scores);
    scores
}

/// Take the top `k` nodes by score, descending; ties break on node name so
/// placement is deterministic.
pub fn select_top_nodes(
    scores: &HashMap<String, f64>,
    mut nodes: Vec<NodeInfo>,
    k: usize,
) -> Vec<NodeInfo> {
    nodes.sort_by(|a, b| {
        let sa = scores.get(&a.name).copied().unwrap_or(0.0);
        let sb = scores.get(&b.name).copied().unwrap_or(0.0);
        sb.partial_cmp(&sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    nodes.truncate(k);
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning(min_nodes: u32, min_pct: u32, pct: i32) -> SchedTuning {
        SchedTuning {
            min_nodes_to_find: min_nodes,
            min_percentage_of_nodes_to_find: min_pct,
            percentage_of_nodes_to_find: pct,
        }
    }

    #[test]
    fn test_small_cluster_scans_everything() {
        assert_eq!(feasible_nodes_to_find(50, &tuning(100, 5, 100)), 50);
        assert_eq!(feasible_nodes_to_find(100, &tuning(100, 5, 10)), 100);
    }

    #[test]
    fn test_configured_percentage() {
        assert_eq!(feasible_nodes_to_find(1000, &tuning(100, 5, 20)), 200);
        // floored at min nodes
        assert_eq!(feasible_nodes_to_find(1000, &tuning(100, 5, 5)), 100);
    }

    #[test]
    fn test_adaptive_percentage_shrinks_with_cluster_size() {
        // 5000 nodes: 50 - 5000/125 = 10 percent
        assert_eq!(feasible_nodes_to_find(5000, &tuning(100, 5, 0)), 500);
        // very large cluster bottoms out at the minimum percentage
        assert_eq!(feasible_nodes_to_find(10000, &tuning(100, 5, 0)), 500);
    }

    #[test]
    fn test_select_top_nodes_breaks_ties_by_name() {
        use crate::api::Resource;
        let nodes = vec![
            NodeInfo::with_capacity("node-b", Resource::new(1000.0, 1000.0)),
            NodeInfo::with_capacity("node-a", Resource::new(1000.0, 1000.0)),
            NodeInfo::with_capacity("node-c", Resource::new(1000.0, 1000.0)),
        ];
        let mut scores = HashMap::new();
        scores.insert("node-a".to_string(), 10.0);
        scores.insert("node-b".to_string(), 10.0);
        scores.insert("node-c".to_string(), 50.0);

        let top = select_top_nodes(&scores, nodes, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "node-c");
        assert_eq!(top[1].name, "node-a");
    }
}
