//! Graph Store
//!
//! Single source of truth for canvas nodes and edges. Every mutation goes
//! through here so the graph invariants hold after each operation:
//!
//! - node ids are unique, edge ids are unique
//! - every edge's source and target reference an existing node
//! - removing a node removes its incident edges in the same step
//!
//! # Failure semantics
//!
//! Operations are total. Canvas events can arrive after the entity they
//! reference was already removed, so an unknown id is a logged no-op, never
//! an error. Mutations that changed state bump `revision`, set the dirty
//! flag and broadcast a [`GraphEvent`].

use crate::db::GraphEvent;
use crate::models::{
    merge_data, Edge, EdgeMetadata, FlowNode, Graph, NodeData, NodeFlags, NodeSnapshot, NodeType,
    Position,
};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Issues decimal node ids
///
/// The next id is one past the larger of the highest numeric id currently
/// in the graph and the highest id this generator has issued. Pasted or
/// loaded ids are therefore never collided with, and ids of deleted nodes
/// are not handed out again within a session.
///
/// Once the numeric space is exhausted (a graph carrying `u64::MAX`), ids
/// fall back to random `n-<uuid>` strings checked against the graph.
#[derive(Debug, Clone, Default)]
pub struct NodeIdGenerator {
    highest_issued: u64,
}

impl NodeIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, existing: &[FlowNode]) -> String {
        let max_existing = existing
            .iter()
            .filter_map(FlowNode::numeric_id)
            .max()
            .unwrap_or(0);

        match max_existing.max(self.highest_issued).checked_add(1) {
            Some(next) => {
                self.highest_issued = next;
                next.to_string()
            }
            None => {
                self.highest_issued = u64::MAX;
                loop {
                    let candidate = format!("n-{}", Uuid::new_v4());
                    if !existing.iter().any(|n| n.id == candidate) {
                        tracing::debug!("Numeric node ids exhausted, issued '{}'", candidate);
                        return candidate;
                    }
                }
            }
        }
    }
}

pub struct GraphStore {
    nodes: Vec<FlowNode>,
    edges: Vec<Edge>,
    ids: NodeIdGenerator,
    revision: u64,
    dirty: bool,
    events: broadcast::Sender<GraphEvent>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            ids: NodeIdGenerator::new(),
            revision: 0,
            dirty: false,
            events,
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<GraphEvent> {
        self.events.subscribe()
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Owned snapshot of the current graph
    pub fn graph(&self) -> Graph {
        Graph::new(self.nodes.clone(), self.edges.clone())
    }

    /// Number of committed mutations since creation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn add_node(&mut self, node_type: NodeType, position: Position, data: NodeData) -> FlowNode {
        let id = self.ids.next_id(&self.nodes);
        let node = FlowNode::new(id, node_type, position, data);
        self.nodes.push(node.clone());
        self.commit(GraphEvent::NodeAdded(node.clone()));
        node
    }

    /// Merge `partial` into the node's data; no-op if the node is gone
    pub fn update_node_data(&mut self, id: &str, partial: NodeData) -> bool {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) else {
            tracing::debug!("Ignoring data change for missing node '{}'", id);
            return false;
        };
        merge_data(&mut node.data, partial);
        self.commit(GraphEvent::NodeDataChanged { id: id.to_string() });
        true
    }

    pub fn move_node(&mut self, id: &str, position: Position) -> bool {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) else {
            tracing::debug!("Ignoring move for missing node '{}'", id);
            return false;
        };
        node.position = position;
        self.commit(GraphEvent::NodeMoved {
            id: id.to_string(),
            position,
        });
        true
    }

    /// Replace the node's UI flags; no-op if the node is gone
    pub fn set_node_flags(&mut self, id: &str, flags: NodeFlags) -> bool {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if node.flags == flags {
            return false;
        }
        node.flags = flags;
        self.commit(GraphEvent::NodeDataChanged { id: id.to_string() });
        true
    }

    /// Remove the node and every edge that touches it
    pub fn remove_node(&mut self, id: &str) -> Option<FlowNode> {
        let Some(position) = self.nodes.iter().position(|n| n.id == id) else {
            tracing::debug!("Ignoring removal of missing node '{}'", id);
            return None;
        };
        let node = self.nodes.remove(position);

        let mut removed_edges = Vec::new();
        self.edges.retain(|edge| {
            if edge.touches(id) {
                removed_edges.push(edge.id.clone());
                false
            } else {
                true
            }
        });

        self.commit(GraphEvent::NodeRemoved {
            id: id.to_string(),
            removed_edges,
        });
        Some(node)
    }

    /// Add a directed edge; rejected silently if either endpoint is missing
    pub fn add_edge(&mut self, source: &str, target: &str, metadata: EdgeMetadata) -> Option<Edge> {
        if !self.contains_node(source) || !self.contains_node(target) {
            tracing::debug!(
                "Rejecting edge '{}' -> '{}': endpoint missing",
                source,
                target
            );
            return None;
        }

        let edge = Edge::new(self.next_edge_id(source, target), source, target, metadata);
        self.edges.push(edge.clone());
        self.commit(GraphEvent::EdgeAdded(edge.clone()));
        Some(edge)
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let Some(position) = self.edges.iter().position(|e| e.id == id) else {
            tracing::debug!("Ignoring removal of missing edge '{}'", id);
            return None;
        };
        let edge = self.edges.remove(position);
        self.commit(GraphEvent::EdgeRemoved { id: id.to_string() });
        Some(edge)
    }

    /// Remove every edge touching `id`, returning how many were removed
    pub fn remove_incident_edges(&mut self, id: &str) -> usize {
        let incident: Vec<String> = self
            .edges
            .iter()
            .filter(|e| e.touches(id))
            .map(|e| e.id.clone())
            .collect();
        for edge_id in &incident {
            self.remove_edge(edge_id);
        }
        incident.len()
    }

    pub fn copy_node(&self, id: &str) -> Option<NodeSnapshot> {
        self.node(id).map(NodeSnapshot::from)
    }

    /// Snapshot then remove
    pub fn cut_node(&mut self, id: &str) -> Option<NodeSnapshot> {
        let snapshot = self.copy_node(id)?;
        self.remove_node(id);
        Some(snapshot)
    }

    /// Insert a copy of `snapshot` under a fresh id at `position`
    pub fn paste_node(&mut self, snapshot: &NodeSnapshot, position: Position) -> FlowNode {
        let id = self.ids.next_id(&self.nodes);
        let mut node = FlowNode::new(id, snapshot.node_type, position, NodeData::new());
        node.data = snapshot.data.clone();
        node.flags = NodeFlags {
            selected: snapshot.flags.selected,
            locked: snapshot.flags.locked,
            ..NodeFlags::default()
        };
        self.nodes.push(node.clone());
        self.commit(GraphEvent::NodeAdded(node.clone()));
        node
    }

    /// Swap in a whole graph (load, reset)
    ///
    /// Edges with a missing endpoint are dropped so the invariant holds
    /// for whatever the source handed over.
    pub fn replace_graph(&mut self, mut graph: Graph) {
        let pruned = graph.prune_dangling_edges();
        if pruned > 0 {
            tracing::warn!("Dropped {} dangling edge(s) from replacement graph", pruned);
        }
        self.nodes = graph.nodes;
        self.edges = graph.edges;
        self.commit(GraphEvent::GraphReplaced);
    }

    pub fn clear(&mut self) {
        self.replace_graph(Graph::default());
    }

    fn next_edge_id(&self, source: &str, target: &str) -> String {
        loop {
            let candidate = format!("e{}-{}-{}", source, target, Uuid::new_v4().simple());
            if !self.edges.iter().any(|e| e.id == candidate) {
                return candidate;
            }
        }
    }

    fn commit(&mut self, event: GraphEvent) {
        self.revision += 1;
        self.dirty = true;
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn text(store: &mut GraphStore) -> FlowNode {
        store.add_node(NodeType::Text, Position::default(), Map::new())
    }

    #[test]
    fn test_add_node_issues_sequential_ids() {
        let mut store = GraphStore::new();
        let a = text(&mut store);
        let b = text(&mut store);

        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");
        assert!(store.is_dirty());
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_add_node_after_max_numeric_id_does_not_overflow() {
        let mut store = GraphStore::new();
        let max_id = u64::MAX.to_string();
        store.replace_graph(Graph::new(
            vec![FlowNode::new(
                max_id.clone(),
                NodeType::Text,
                Position::default(),
                Map::new(),
            )],
            vec![],
        ));

        let a = text(&mut store);
        let b = text(&mut store);

        assert!(a.id.starts_with("n-"));
        assert!(b.id.starts_with("n-"));
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, max_id);
        assert_eq!(store.nodes().len(), 3);
    }

    #[test]
    fn test_add_node_seeds_type_defaults() {
        let mut store = GraphStore::new();
        let node = store.add_node(NodeType::Image, Position::new(3.0, 4.0), Map::new());

        assert_eq!(node.data.get("imageUrl"), Some(&serde_json::Value::Null));
        assert_eq!(node.data.get("label"), Some(&json!("Image")));
        assert_eq!(store.node(&node.id).unwrap().position, Position::new(3.0, 4.0));
    }

    #[test]
    fn test_ids_skip_past_loaded_ids() {
        let mut store = GraphStore::new();
        store.replace_graph(Graph::new(
            vec![
                FlowNode::new("41", NodeType::Text, Position::default(), Map::new()),
                FlowNode::new("note", NodeType::Text, Position::default(), Map::new()),
            ],
            vec![],
        ));

        assert_eq!(text(&mut store).id, "42");
    }

    #[test]
    fn test_ids_not_reissued_after_delete() {
        let mut store = GraphStore::new();
        text(&mut store);
        let second = text(&mut store);
        store.remove_node(&second.id);

        assert_eq!(text(&mut store).id, "3");
    }

    #[test]
    fn test_update_and_move_missing_node_are_noops() {
        let mut store = GraphStore::new();
        let revision = store.revision();

        assert!(!store.update_node_data("9", Map::new()));
        assert!(!store.move_node("9", Position::new(1.0, 1.0)));
        assert!(store.remove_node("9").is_none());
        assert!(store.remove_edge("e9").is_none());
        assert_eq!(store.revision(), revision);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_update_node_data_merges() {
        let mut store = GraphStore::new();
        let node = text(&mut store);

        let mut partial = Map::new();
        partial.insert("text".to_string(), json!("hello"));
        assert!(store.update_node_data(&node.id, partial));

        let updated = store.node(&node.id).unwrap();
        assert_eq!(updated.data.get("text"), Some(&json!("hello")));
        assert_eq!(updated.data.get("label"), Some(&json!("Text")));
    }

    #[test]
    fn test_add_edge_requires_both_endpoints() {
        let mut store = GraphStore::new();
        let a = text(&mut store);

        assert!(store.add_edge(&a.id, "missing", EdgeMetadata::default()).is_none());
        assert!(store.edges().is_empty());
    }

    #[test]
    fn test_parallel_edges_and_self_loops_are_allowed() {
        let mut store = GraphStore::new();
        let a = text(&mut store);
        let b = text(&mut store);

        let first = store.add_edge(&a.id, &b.id, EdgeMetadata::default()).unwrap();
        let second = store.add_edge(&a.id, &b.id, EdgeMetadata::default()).unwrap();
        let looped = store.add_edge(&a.id, &a.id, EdgeMetadata::default()).unwrap();

        assert_ne!(first.id, second.id);
        assert!(looped.is_self_loop());
        assert_eq!(store.edges().len(), 3);
    }

    #[test]
    fn test_remove_node_cascades_edges() {
        let mut store = GraphStore::new();
        let a = text(&mut store);
        let b = text(&mut store);
        let c = text(&mut store);
        store.add_edge(&a.id, &b.id, EdgeMetadata::default());
        store.add_edge(&b.id, &c.id, EdgeMetadata::default());
        let keep = store.add_edge(&a.id, &c.id, EdgeMetadata::default()).unwrap();

        store.remove_node(&b.id);

        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.edges()[0].id, keep.id);
        assert!(store.edges().iter().all(|e| !e.touches(&b.id)));
    }

    #[test]
    fn test_remove_incident_edges() {
        let mut store = GraphStore::new();
        let a = text(&mut store);
        let b = text(&mut store);
        let c = text(&mut store);
        store.add_edge(&a.id, &b.id, EdgeMetadata::default());
        store.add_edge(&c.id, &a.id, EdgeMetadata::default());
        store.add_edge(&b.id, &c.id, EdgeMetadata::default());

        assert_eq!(store.remove_incident_edges(&a.id), 2);
        assert_eq!(store.edges().len(), 1);
        assert!(store.contains_node(&a.id));
    }

    #[test]
    fn test_copy_cut_paste() {
        let mut store = GraphStore::new();
        let mut data = Map::new();
        data.insert("label".to_string(), json!("Draft"));
        let original = store.add_node(NodeType::Social, Position::default(), data);

        let snapshot = store.cut_node(&original.id).unwrap();
        assert!(!store.contains_node(&original.id));

        let pasted = store.paste_node(&snapshot, Position::new(9.0, 9.0));
        assert_ne!(pasted.id, original.id);
        assert_eq!(pasted.node_type, NodeType::Social);
        assert_eq!(pasted.label(), "Draft");
        assert_eq!(pasted.position, Position::new(9.0, 9.0));

        assert!(store.copy_node("missing").is_none());
        assert!(store.cut_node("missing").is_none());
    }

    #[test]
    fn test_paste_restores_interactivity() {
        let mut store = GraphStore::new();
        let node = text(&mut store);
        let mut flags = node.flags;
        flags.set_interactive(false);
        flags.locked = true;
        store.set_node_flags(&node.id, flags);

        let snapshot = store.copy_node(&node.id).unwrap();
        let pasted = store.paste_node(&snapshot, Position::default());

        assert!(pasted.flags.locked);
        assert!(pasted.flags.draggable);
        assert!(pasted.flags.deletable);
    }

    #[test]
    fn test_replace_graph_prunes_dangling_edges() {
        let mut store = GraphStore::new();
        store.replace_graph(Graph::new(
            vec![FlowNode::new("1", NodeType::Text, Position::default(), Map::new())],
            vec![Edge::new("e", "1", "2", EdgeMetadata::default())],
        ));
        assert!(store.edges().is_empty());
        assert_eq!(store.nodes().len(), 1);
    }

    #[tokio::test]
    async fn test_events_emitted_for_committed_mutations_only() {
        let mut store = GraphStore::new();
        let mut rx = store.subscribe_to_events();

        let a = text(&mut store);
        store.move_node("missing", Position::default());
        store.remove_node(&a.id);

        match rx.recv().await.unwrap() {
            GraphEvent::NodeAdded(node) => assert_eq!(node.id, a.id),
            other => panic!("Expected NodeAdded, got {:?}", other),
        }
        match rx.recv().await.unwrap() {
            GraphEvent::NodeRemoved { id, removed_edges } => {
                assert_eq!(id, a.id);
                assert!(removed_edges.is_empty());
            }
            other => panic!("Expected NodeRemoved, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}
