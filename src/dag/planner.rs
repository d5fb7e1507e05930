//! Execution Planner - Kahn's algorithm with declaration-order tie-break

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use super::graph::{AdaptorGraph, Adjacency};
use super::validate::detect_cycle;
use crate::error::AdcsError;

/// Topological order of node indices
///
/// Among simultaneously eligible nodes the earliest declared goes first, so
/// the order is reproducible. Returns `None` when a cycle leaves nodes
/// unplaced; a partial order is never returned.
pub fn topological_order(adjacency: &Adjacency) -> Option<Vec<usize>> {
    let n = adjacency.len();
    let mut indegree: Vec<usize> = adjacency.predecessors.iter().map(|p| p.len()).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|(_, &deg)| deg == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();
    let mut order = Vec::with_capacity(n);

    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &succ in &adjacency.successors[idx] {
            indegree[succ] -= 1;
            if indegree[succ] == 0 {
                ready.push(Reverse(succ));
            }
        }
    }

    (order.len() == n).then_some(order)
}

/// Plan the execution order of `graph`
///
/// Fails with `DanglingReference` or `CycleDetected` (with the cycle's id
/// sequence). Works on unvalidated graphs.
pub fn plan(graph: &AdaptorGraph) -> Result<Vec<Arc<str>>, AdcsError> {
    let adjacency = graph.adjacency()?;
    match topological_order(&adjacency) {
        Some(order) => Ok(order
            .into_iter()
            .map(|idx| Arc::clone(&graph.node(idx).id))
            .collect()),
        None => Err(detect_cycle(graph, &adjacency)
            .err()
            .unwrap_or_else(|| AdcsError::Internal {
                reason: "planner left nodes unplaced without a cycle".to_string(),
            })),
    }
}
