//! Graph Change Events
//!
//! The graph store emits one event per committed mutation on a tokio
//! broadcast channel, so observers (the canvas bridge, debugging tools)
//! can follow changes without coupling to the store.
//!
//! # Event Flow
//!
//! 1. `GraphStore` applies a mutation
//! 2. If the mutation changed state, a `GraphEvent` is broadcast
//! 3. Subscribers receive it asynchronously; lagging subscribers drop events
//!
//! No-op mutations (unknown ids, rejected edges) emit nothing. Events are
//! tagged by an `event` field since node payloads already use `type`.

use crate::models::{Edge, FlowNode, Position};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum GraphEvent {
    NodeAdded(FlowNode),

    NodeMoved { id: String, position: Position },

    NodeDataChanged { id: String },

    /// A node was removed together with every incident edge
    #[serde(rename_all = "camelCase")]
    NodeRemoved {
        id: String,
        removed_edges: Vec<String>,
    },

    EdgeAdded(Edge),

    EdgeRemoved { id: String },

    /// The whole graph was swapped (load, reset)
    GraphReplaced,
}

impl GraphEvent {
    pub fn event_type(&self) -> &str {
        match self {
            GraphEvent::NodeAdded(_) => "node:added",
            GraphEvent::NodeMoved { .. } => "node:moved",
            GraphEvent::NodeDataChanged { .. } => "node:data-changed",
            GraphEvent::NodeRemoved { .. } => "node:removed",
            GraphEvent::EdgeAdded(_) => "edge:added",
            GraphEvent::EdgeRemoved { .. } => "edge:removed",
            GraphEvent::GraphReplaced => "graph:replaced",
        }
    }

    /// Whether the event can change the ordered/unordered partition
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            GraphEvent::NodeMoved { .. } | GraphEvent::NodeDataChanged { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EdgeMetadata;

    /// The canvas bridge reads these as flat, internally-tagged objects
    #[test]
    fn test_graph_event_serialization_contract() {
        let event = GraphEvent::NodeRemoved {
            id: "4".to_string(),
            removed_edges: vec!["e1".to_string()],
        };
        let parsed = serde_json::to_value(&event).unwrap();

        assert_eq!(parsed.get("event").unwrap(), "nodeRemoved");
        assert_eq!(parsed.get("id").unwrap(), "4");
        assert_eq!(parsed["removedEdges"][0], "e1");

        let edge = Edge::new("e9", "1", "2", EdgeMetadata::default());
        let parsed = serde_json::to_value(GraphEvent::EdgeAdded(edge)).unwrap();
        assert_eq!(parsed.get("event").unwrap(), "edgeAdded");
        assert_eq!(parsed.get("source").unwrap(), "1");
    }

    #[test]
    fn test_structural_classification() {
        assert!(!GraphEvent::NodeMoved {
            id: "1".to_string(),
            position: Position::default()
        }
        .is_structural());
        assert!(!GraphEvent::NodeDataChanged { id: "1".to_string() }.is_structural());
        assert!(GraphEvent::EdgeRemoved { id: "e".to_string() }.is_structural());
        assert!(GraphEvent::GraphReplaced.is_structural());
    }
}
