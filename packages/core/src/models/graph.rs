//! Graph snapshot: the pair (nodes, edges) at a point in time

use super::{Edge, FlowNode, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<FlowNode>,

    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(nodes: Vec<FlowNode>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Reject snapshots whose node or edge ids collide
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(ValidationError::DuplicateNodeId(node.id.clone()));
            }
        }

        let mut seen = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !seen.insert(edge.id.as_str()) {
                return Err(ValidationError::DuplicateEdgeId(edge.id.clone()));
            }
        }
        Ok(())
    }

    /// Drop edges whose source or target is not a node of this graph
    ///
    /// Returns the number of edges removed.
    pub fn prune_dangling_edges(&mut self) -> usize {
        let ids: HashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        let before = self.edges.len();
        self.edges
            .retain(|e| ids.contains(&e.source) && ids.contains(&e.target));
        before - self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EdgeMetadata, NodeType, Position};
    use serde_json::Map;

    fn node(id: &str) -> FlowNode {
        FlowNode::new(id, NodeType::Text, Position::default(), Map::new())
    }

    #[test]
    fn test_validate_rejects_duplicate_node_ids() {
        let graph = Graph::new(vec![node("1"), node("1")], vec![]);
        assert_eq!(
            graph.validate(),
            Err(ValidationError::DuplicateNodeId("1".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_edge_ids() {
        let graph = Graph::new(
            vec![node("1"), node("2")],
            vec![
                Edge::new("e", "1", "2", EdgeMetadata::default()),
                Edge::new("e", "2", "1", EdgeMetadata::default()),
            ],
        );
        assert!(matches!(
            graph.validate(),
            Err(ValidationError::DuplicateEdgeId(_))
        ));
    }

    #[test]
    fn test_prune_dangling_edges() {
        let mut graph = Graph::new(
            vec![node("1"), node("2")],
            vec![
                Edge::new("a", "1", "2", EdgeMetadata::default()),
                Edge::new("b", "2", "9", EdgeMetadata::default()),
            ],
        );
        assert_eq!(graph.prune_dangling_edges(), 1);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].id, "a");
    }
}
