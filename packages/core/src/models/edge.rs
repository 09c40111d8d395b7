//! Directed connections between canvas nodes

use serde::{Deserialize, Serialize};

/// Arrow drawn at the target end of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeMarker {
    #[default]
    ArrowClosed,
    Arrow,
    None,
}

/// Connection-point labels supplied when an edge is drawn
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl EdgeMetadata {
    pub fn with_handles(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_handle: Some(source.into()),
            target_handle: Some(target.into()),
        }
    }
}

/// A directed edge `source -> target`
///
/// Parallel edges and self-loops are legal; the store only guarantees that
/// both endpoints exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,

    #[serde(default)]
    pub marker_end: EdgeMarker,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        metadata: EdgeMetadata,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: metadata.source_handle,
            target_handle: metadata.target_handle,
            marker_end: EdgeMarker::default(),
        }
    }

    /// Whether `node_id` is either endpoint
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}
