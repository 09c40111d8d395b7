//! Data Models
//!
//! This module contains the data structures shared by the graph store,
//! the task ordering and the persistence layer:
//!
//! - `FlowNode` / `Edge` / `Graph` - canvas content
//! - `CanvasEvent` - gestures reported by the canvas
//! - `CacheRecord` / `SavedDocument` and remote request shapes

mod canvas;
mod document;
mod edge;
mod graph;
mod node;

pub use canvas::CanvasEvent;
pub use document::{
    dedupe_by_uuid, filter_documents, CacheRecord, DeleteResponse, DocumentSummary,
    RemoteDocument, SaveRequest, SaveResponse, SavedDocument, UploadResponse,
};
pub use edge::{Edge, EdgeMarker, EdgeMetadata};
pub use graph::Graph;
pub use node::{
    merge_data, FlowNode, NodeData, NodeFlags, NodeSnapshot, NodeType, Position, ValidationError,
};
