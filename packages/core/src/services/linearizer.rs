//! Task linearization
//!
//! Kahn's algorithm over the canvas graph, made total: nodes that never
//! reach in-degree zero (cycles, self-loops, anything downstream of a cycle)
//! are appended after the sorted prefix in their original relative order.
//! The function is pure; the same inputs always produce the same sequence.
//!
//! Tie-breaking follows the node collection order. Parallel edges count
//! once each toward in-degree and are decremented once each. Edges whose
//! source or target is not in `nodes` are ignored.

use crate::models::{Edge, FlowNode};
use std::collections::{HashMap, VecDeque};

/// Order `nodes` consistently with `edges`, returning every node exactly once
pub fn order<'a>(nodes: &'a [FlowNode], edges: &[Edge]) -> Vec<&'a FlowNode> {
    order_indices(nodes, edges)
        .into_iter()
        .map(|i| &nodes[i])
        .collect()
}

/// Same as [`order`], returning ids
pub fn order_ids(nodes: &[FlowNode], edges: &[Edge]) -> Vec<String> {
    order_indices(nodes, edges)
        .into_iter()
        .map(|i| nodes[i].id.clone())
        .collect()
}

fn order_indices(nodes: &[FlowNode], edges: &[Edge]) -> Vec<usize> {
    // First occurrence wins if the caller passes duplicate ids
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        index.entry(node.id.as_str()).or_insert(i);
    }

    let mut in_degree = vec![0usize; nodes.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for edge in edges {
        let (Some(&source), Some(&target)) = (
            index.get(edge.source.as_str()),
            index.get(edge.target.as_str()),
        ) else {
            continue;
        };
        in_degree[target] += 1;
        successors[source].push(target);
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut visited = vec![false; nodes.len()];
    let mut result = Vec::with_capacity(nodes.len());

    while let Some(current) = queue.pop_front() {
        visited[current] = true;
        result.push(current);

        for &next in &successors[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if result.len() < nodes.len() {
        tracing::debug!(
            "Linearization left {} of {} nodes unsorted (cycle), appending in original order",
            nodes.len() - result.len(),
            nodes.len()
        );
        result.extend((0..nodes.len()).filter(|&i| !visited[i]));
    }

    result
}
