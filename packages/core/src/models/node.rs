//! Node Data Structures
//!
//! This module defines the canvas node model: a typed, positioned unit of
//! content with a free-form data payload whose shape depends on its type.
//!
//! # Examples
//!
//! ```rust
//! use flowlist_core::models::{FlowNode, NodeType, Position};
//! use serde_json::Map;
//!
//! let node = FlowNode::new("1", NodeType::Image, Position::new(10.0, 20.0), Map::new());
//! assert_eq!(node.data.get("label").and_then(|v| v.as_str()), Some("Image"));
//! assert!(node.data.get("imageUrl").is_some_and(|v| v.is_null()));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Free-form key/value payload carried by a node
pub type NodeData = Map<String, Value>;

/// Errors raised when interpreting node model input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid node type: {0}")]
    InvalidNodeType(String),

    #[error("Duplicate node ID: {0}")]
    DuplicateNodeId(String),

    #[error("Duplicate edge ID: {0}")]
    DuplicateEdgeId(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Closed set of node kinds the canvas palette offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Text,
    Image,
    Attachment,
    Social,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Text => "text",
            NodeType::Image => "image",
            NodeType::Attachment => "attachment",
            NodeType::Social => "social",
        }
    }

    /// Type-specific data every freshly created node starts from
    pub fn default_data(&self) -> NodeData {
        let value = match self {
            NodeType::Text => json!({ "label": "Text", "text": "" }),
            NodeType::Image => json!({ "label": "Image", "imageUrl": null }),
            NodeType::Attachment => {
                json!({ "label": "Attachment", "fileUrl": null, "fileName": null })
            }
            NodeType::Social => json!({ "label": "Social", "url": "", "platform": null }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Whether nodes of this type carry an uploaded file
    pub fn accepts_upload(&self) -> bool {
        matches!(self, NodeType::Image | NodeType::Attachment)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(NodeType::Text),
            "image" => Ok(NodeType::Image),
            "attachment" => Ok(NodeType::Attachment),
            "social" => Ok(NodeType::Social),
            other => Err(ValidationError::InvalidNodeType(other.to_string())),
        }
    }
}

/// Canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

fn default_true() -> bool {
    true
}

/// Transient UI flags
///
/// `selected` and `locked` belong to the canvas and are carried through
/// untouched. The interactivity flags are switched off while a node is
/// marked complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFlags {
    #[serde(default)]
    pub selected: bool,

    #[serde(default)]
    pub locked: bool,

    #[serde(default = "default_true")]
    pub draggable: bool,

    #[serde(default = "default_true")]
    pub connectable: bool,

    #[serde(default = "default_true")]
    pub deletable: bool,
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self {
            selected: false,
            locked: false,
            draggable: true,
            connectable: true,
            deletable: true,
        }
    }
}

impl NodeFlags {
    pub fn set_interactive(&mut self, interactive: bool) {
        self.draggable = interactive;
        self.connectable = interactive;
        self.deletable = interactive;
    }
}

/// A node on the flow canvas
///
/// # Fields
///
/// - `id`: Decimal sequence id issued by [`NodeIdGenerator`](crate::services::NodeIdGenerator)
/// - `node_type`: One of the palette kinds
/// - `position`: Canvas coordinates
/// - `data`: Type-specific payload (see [`NodeType::default_data`])
/// - `flags`: UI flags preserved across edits and persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub id: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    pub position: Position,

    #[serde(default)]
    pub data: NodeData,

    #[serde(flatten)]
    pub flags: NodeFlags,
}

impl FlowNode {
    /// Create a node seeded with its type defaults, `initial_data` merged on top
    pub fn new(
        id: impl Into<String>,
        node_type: NodeType,
        position: Position,
        initial_data: NodeData,
    ) -> Self {
        let mut data = node_type.default_data();
        merge_data(&mut data, initial_data);
        Self {
            id: id.into(),
            node_type,
            position,
            data,
            flags: NodeFlags::default(),
        }
    }

    /// Human-readable label, falling back to the type name
    pub fn label(&self) -> &str {
        self.data
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or_else(|| self.node_type.as_str())
    }

    /// Numeric value of the id, if it is a decimal sequence id
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.parse().ok()
    }
}

/// Shallow-merge `partial` into `data`; keys in `partial` win
pub fn merge_data(data: &mut NodeData, partial: NodeData) {
    for (key, value) in partial {
        data.insert(key, value);
    }
}

/// Copy of a node's content used by copy/cut/paste
///
/// Only the type, data and flags survive; paste assigns a fresh id and
/// the target position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub node_type: NodeType,
    pub data: NodeData,
    #[serde(default)]
    pub flags: NodeFlags,
}

impl From<&FlowNode> for NodeSnapshot {
    fn from(node: &FlowNode) -> Self {
        Self {
            node_type: node.node_type,
            data: node.data.clone(),
            flags: node.flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_defaults() {
        let node = FlowNode::new("1", NodeType::Image, Position::default(), Map::new());
        assert_eq!(node.data.get("imageUrl"), Some(&Value::Null));
        assert_eq!(node.label(), "Image");
    }

    #[test]
    fn test_initial_data_overrides_defaults() {
        let mut initial = Map::new();
        initial.insert("label".to_string(), json!("Write intro"));
        initial.insert("priority".to_string(), json!("high"));

        let node = FlowNode::new("7", NodeType::Text, Position::new(1.0, 2.0), initial);
        assert_eq!(node.label(), "Write intro");
        assert_eq!(node.data.get("text"), Some(&json!("")));
        assert_eq!(node.data.get("priority"), Some(&json!("high")));
        assert_eq!(node.numeric_id(), Some(7));
    }

    #[test]
    fn test_node_type_parse() {
        assert_eq!("social".parse::<NodeType>(), Ok(NodeType::Social));
        assert_eq!(
            "video".parse::<NodeType>(),
            Err(ValidationError::InvalidNodeType("video".to_string()))
        );
    }

    #[test]
    fn test_serialization_contract() {
        let node = FlowNode::new("3", NodeType::Attachment, Position::new(5.0, 6.0), Map::new());
        let value = serde_json::to_value(&node).unwrap();

        assert_eq!(value.get("type").unwrap(), "attachment");
        assert_eq!(value.get("draggable").unwrap(), true);
        assert!(value.get("flags").is_none(), "flags should be flattened");
        assert!(value["data"].get("fileName").unwrap().is_null());
    }

    #[test]
    fn test_missing_flags_default_to_interactive() {
        let node: FlowNode = serde_json::from_value(json!({
            "id": "1",
            "type": "text",
            "position": { "x": 0.0, "y": 0.0 },
            "data": { "label": "A" },
            "locked": true
        }))
        .unwrap();

        assert!(node.flags.locked);
        assert!(node.flags.draggable);
        assert!(node.flags.deletable);
    }
}
