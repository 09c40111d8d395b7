//! Gesture events reported by the canvas collaborator
//!
//! The canvas delivers these one at a time; ids may refer to entities that
//! were already removed, so every consumer treats unknown ids as no-ops.

use super::{EdgeMetadata, NodeData, NodeType, Position};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CanvasEvent {
    #[serde(rename_all = "camelCase")]
    NodeAdd {
        node_type: NodeType,
        position: Position,
        #[serde(default)]
        data: NodeData,
    },

    NodeMove { id: String, position: Position },

    NodeRemove { id: String },

    EdgeAdd {
        source: String,
        target: String,
        #[serde(flatten)]
        metadata: EdgeMetadata,
    },

    EdgeRemove { id: String },

    NodeDataChange { id: String, data: NodeData },
}

impl CanvasEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            CanvasEvent::NodeAdd { .. } => "node:add",
            CanvasEvent::NodeMove { .. } => "node:move",
            CanvasEvent::NodeRemove { .. } => "node:remove",
            CanvasEvent::EdgeAdd { .. } => "edge:add",
            CanvasEvent::EdgeRemove { .. } => "edge:remove",
            CanvasEvent::NodeDataChange { .. } => "node:data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canvas_event_wire_format() {
        let event: CanvasEvent = serde_json::from_value(json!({
            "type": "nodeAdd",
            "nodeType": "image",
            "position": { "x": 1.0, "y": 2.0 }
        }))
        .unwrap();
        assert!(matches!(
            event,
            CanvasEvent::NodeAdd { node_type: NodeType::Image, .. }
        ));

        let event: CanvasEvent = serde_json::from_value(json!({
            "type": "edgeAdd",
            "source": "1",
            "target": "2",
            "sourceHandle": "bottom"
        }))
        .unwrap();
        match event {
            CanvasEvent::EdgeAdd { metadata, .. } => {
                assert_eq!(metadata.source_handle.as_deref(), Some("bottom"));
                assert!(metadata.target_handle.is_none());
            }
            other => panic!("Expected EdgeAdd, got {:?}", other),
        }
    }

    #[test]
    fn test_event_type_names() {
        let event = CanvasEvent::NodeRemove { id: "1".to_string() };
        assert_eq!(event.event_type(), "node:remove");
    }
}
