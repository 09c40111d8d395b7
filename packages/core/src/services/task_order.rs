//! Task Ordering
//!
//! Layers a user-adjustable sequence on top of the linearizer output.
//!
//! A node is *ordered* when it is an endpoint of at least one edge and
//! *unordered* otherwise. The controller keeps a manual sequence of the
//! ordered nodes which survives edits instead of being recomputed:
//!
//! - nodes that stay ordered keep their relative manual position
//! - nodes that leave the ordered partition are dropped
//! - newly ordered nodes are inserted right after the closest node that
//!   precedes them in the linearization and is already in the sequence, or
//!   at the front when there is none
//!
//! Drag-reordering permutes the manual sequence and never touches edges.

use super::linearizer;
use crate::models::{Edge, FlowNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Immutable result of a reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskOrder {
    pub ordered: Vec<String>,
    pub unordered: Vec<String>,
}

impl TaskOrder {
    /// Ordered partition followed by the unordered one
    pub fn sequence(&self) -> impl Iterator<Item = &str> {
        self.ordered
            .iter()
            .chain(self.unordered.iter())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ordered.len() + self.unordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty() && self.unordered.is_empty()
    }

    pub fn is_ordered(&self, id: &str) -> bool {
        self.ordered.iter().any(|n| n == id)
    }

    pub fn is_unordered(&self, id: &str) -> bool {
        self.unordered.iter().any(|n| n == id)
    }

    /// 1-based step number within the ordered partition
    pub fn step_number(&self, id: &str) -> Option<usize> {
        self.ordered.iter().position(|n| n == id).map(|i| i + 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskOrderController {
    manual: Vec<String>,
}

impl TaskOrderController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manual_sequence(&self) -> &[String] {
        &self.manual
    }

    /// Merge the current graph structure into the manual sequence
    pub fn reconcile(&mut self, nodes: &[FlowNode], edges: &[Edge]) -> TaskOrder {
        let node_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let connected: HashSet<&str> = edges
            .iter()
            .filter(|e| node_ids.contains(e.source.as_str()) && node_ids.contains(e.target.as_str()))
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect();

        self.manual.retain(|id| connected.contains(id.as_str()));

        let linear = linearizer::order_ids(nodes, edges);
        let mut placed: HashSet<String> = self.manual.iter().cloned().collect();
        let mut previous: Option<&str> = None;

        for id in linear.iter().filter(|id| connected.contains(id.as_str())) {
            if !placed.contains(id) {
                let at = previous
                    .and_then(|p| self.manual.iter().position(|m| m == p))
                    .map(|i| i + 1)
                    .unwrap_or(0);
                self.manual.insert(at, id.clone());
                placed.insert(id.clone());
            }
            previous = Some(id.as_str());
        }

        let unordered = nodes
            .iter()
            .filter(|n| !connected.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();

        TaskOrder {
            ordered: self.manual.clone(),
            unordered,
        }
    }

    /// Move `id` directly before `anchor`; false if either is not in the sequence
    pub fn move_before(&mut self, id: &str, anchor: &str) -> bool {
        self.relocate(id, anchor, false)
    }

    /// Move `id` directly after `anchor`; false if either is not in the sequence
    pub fn move_after(&mut self, id: &str, anchor: &str) -> bool {
        self.relocate(id, anchor, true)
    }

    /// Move `id` to `index` (clamped to the sequence length)
    pub fn move_to(&mut self, id: &str, index: usize) -> bool {
        let Some(from) = self.manual.iter().position(|m| m == id) else {
            return false;
        };
        let item = self.manual.remove(from);
        let index = index.min(self.manual.len());
        self.manual.insert(index, item);
        true
    }

    /// Forget manual adjustments; the next reconciliation adopts the linearization
    pub fn reset(&mut self) {
        self.manual.clear();
    }

    fn relocate(&mut self, id: &str, anchor: &str, after: bool) -> bool {
        if id == anchor {
            return false;
        }
        let Some(from) = self.manual.iter().position(|m| m == id) else {
            return false;
        };
        if !self.manual.iter().any(|m| m == anchor) {
            return false;
        }

        let item = self.manual.remove(from);
        let Some(anchor_at) = self.manual.iter().position(|m| m == anchor) else {
            // Unreachable: anchor checked above and differs from id
            self.manual.insert(from, item);
            return false;
        };
        let at = if after { anchor_at + 1 } else { anchor_at };
        self.manual.insert(at, item);
        true
    }
}

/// Node ids marked complete, independent of graph structure
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletionState {
    completed: BTreeSet<String>,
}

impl CompletionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            completed: ids.into_iter().collect(),
        }
    }

    pub fn is_complete(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    /// Flip the state of `id`, returning the new value
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.completed.remove(id) {
            false
        } else {
            self.completed.insert(id.to_string());
            true
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.completed.remove(id)
    }

    /// Drop entries whose node no longer exists
    pub fn retain_existing(&mut self, nodes: &[FlowNode]) {
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        self.completed.retain(|id| ids.contains(id.as_str()));
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.completed.iter().cloned().collect()
    }
}
