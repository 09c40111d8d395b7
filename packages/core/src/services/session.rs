//! Flow Session
//!
//! Owns one editing session: the graph store, the task ordering, completion
//! marks, the document tag and the persistence coordinator. Canvas events
//! are applied one at a time in arrival order; each committed mutation runs
//! reconciliation (when structural), completion pruning and autosave before
//! the call returns.
//!
//! # Examples
//!
//! ```no_run
//! use flowlist_core::{CanvasEvent, FlowConfig, FlowSession, NodeType, Position};
//! use flowlist_core::db::{Credential, MemoryKeyValueStore, MemoryRemoteStore, StaticCredentials};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut session = FlowSession::start(
//!     &FlowConfig::default(),
//!     Arc::new(MemoryKeyValueStore::new()),
//!     Arc::new(MemoryRemoteStore::new()),
//!     Arc::new(StaticCredentials::new(Credential::new("token"))),
//! );
//!
//! let a = session.add_node(NodeType::Text, Position::new(0.0, 0.0), Default::default());
//! let b = session.add_node(NodeType::Text, Position::new(0.0, 80.0), Default::default());
//! session.apply(CanvasEvent::EdgeAdd {
//!     source: a.id.clone(),
//!     target: b.id.clone(),
//!     metadata: Default::default(),
//! });
//!
//! assert_eq!(session.task_order().ordered, vec![a.id, b.id]);
//! session.save("Morning routine").await?;
//! # Ok(())
//! # }
//! ```

use super::graph_store::GraphStore;
use super::persistence::{
    DeleteOutcome, LoadOutcome, PendingLoad, PendingSave, PersistenceCoordinator, RemoteHandle,
    SaveReceipt, SaveTarget,
};
use super::task_order::{CompletionState, TaskOrder, TaskOrderController};
use super::PersistenceError;
use crate::config::FlowConfig;
use crate::db::{CredentialProvider, GraphEvent, KeyValueStore, RemoteStore};
use crate::models::{
    CanvasEvent, DocumentSummary, Edge, EdgeMetadata, FlowNode, Graph, NodeData, NodeSnapshot,
    NodeType, Position, RemoteDocument, UploadResponse,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct FlowSession {
    store: GraphStore,
    order: TaskOrderController,
    task_order: TaskOrder,
    completion: CompletionState,
    tag: String,
    persistence: PersistenceCoordinator,
    autosave: bool,
    changes: broadcast::Receiver<GraphEvent>,
}

impl FlowSession {
    /// Create an empty session with a fresh identifier
    pub fn new(
        config: &FlowConfig,
        cache: Arc<dyn KeyValueStore + Send + Sync>,
        remote: Arc<dyn RemoteStore + Send + Sync>,
        credentials: Arc<dyn CredentialProvider + Send + Sync>,
    ) -> Self {
        let store = GraphStore::with_capacity(config.event_channel_capacity);
        let changes = store.subscribe_to_events();
        Self {
            store,
            order: TaskOrderController::new(),
            task_order: TaskOrder::default(),
            completion: CompletionState::new(),
            tag: String::new(),
            persistence: PersistenceCoordinator::new(config, cache, remote, credentials),
            autosave: config.autosave,
            changes,
        }
    }

    /// Create a session, sweep stale cache entries and restore scratch work
    pub fn start(
        config: &FlowConfig,
        cache: Arc<dyn KeyValueStore + Send + Sync>,
        remote: Arc<dyn RemoteStore + Send + Sync>,
        credentials: Arc<dyn CredentialProvider + Send + Sync>,
    ) -> Self {
        let mut session = Self::new(config, cache, remote, credentials);
        session.persistence.purge_expired_cache();
        session.restore_scratch();
        session
    }

    /// Re-open the unsaved scratch graph, if one is cached
    pub fn restore_scratch(&mut self) -> bool {
        let Some(record) = self.persistence.read_scratch() else {
            return false;
        };
        tracing::info!(
            "Restoring unsaved scratch graph with {} node(s)",
            record.nodes.len()
        );
        self.apply_document(record.graph(), record.tag, record.completed);
        self.persistence.mark_unsaved();
        true
    }

    // Read access

    pub fn nodes(&self) -> &[FlowNode] {
        self.store.nodes()
    }

    pub fn edges(&self) -> &[Edge] {
        self.store.edges()
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.store.node(id)
    }

    pub fn graph(&self) -> Graph {
        self.store.graph()
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    pub fn task_order(&self) -> &TaskOrder {
        &self.task_order
    }

    pub fn completion(&self) -> &CompletionState {
        &self.completion
    }

    pub fn is_complete(&self, id: &str) -> bool {
        self.completion.is_complete(id)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn active_id(&self) -> &str {
        self.persistence.active_id()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.persistence.has_unsaved_changes()
    }

    pub fn unload_warning(&self) -> Option<&'static str> {
        self.persistence.unload_warning()
    }

    pub fn subscribe_to_events(&self) -> broadcast::Receiver<GraphEvent> {
        self.store.subscribe_to_events()
    }

    pub fn persistence(&self) -> &PersistenceCoordinator {
        &self.persistence
    }

    /// Detached remote access for callers driving the two-phase protocol
    pub fn remote(&self) -> RemoteHandle {
        self.persistence.remote()
    }

    // Canvas gestures

    /// Apply one canvas event
    pub fn apply(&mut self, event: CanvasEvent) {
        tracing::debug!("Applying canvas event {}", event.event_type());
        match event {
            CanvasEvent::NodeAdd {
                node_type,
                position,
                data,
            } => {
                self.add_node(node_type, position, data);
            }
            CanvasEvent::NodeMove { id, position } => {
                self.move_node(&id, position);
            }
            CanvasEvent::NodeRemove { id } => {
                self.remove_node(&id);
            }
            CanvasEvent::EdgeAdd {
                source,
                target,
                metadata,
            } => {
                self.connect(&source, &target, metadata);
            }
            CanvasEvent::EdgeRemove { id } => {
                self.disconnect(&id);
            }
            CanvasEvent::NodeDataChange { id, data } => {
                self.update_node_data(&id, data);
            }
        }
    }

    pub fn add_node(&mut self, node_type: NodeType, position: Position, data: NodeData) -> FlowNode {
        let node = self.store.add_node(node_type, position, data);
        self.committed();
        node
    }

    pub fn update_node_data(&mut self, id: &str, data: NodeData) -> bool {
        let changed = self.store.update_node_data(id, data);
        if changed {
            self.committed();
        }
        changed
    }

    /// Canvas drag; ignored for nodes that are not draggable
    pub fn move_node(&mut self, id: &str, position: Position) -> bool {
        if self.store.node(id).is_some_and(|n| !n.flags.draggable) {
            tracing::debug!("Ignoring move of locked node '{}'", id);
            return false;
        }
        let moved = self.store.move_node(id, position);
        if moved {
            self.committed();
        }
        moved
    }

    /// Canvas delete; ignored for nodes that are not deletable
    pub fn remove_node(&mut self, id: &str) -> Option<FlowNode> {
        if self.store.node(id).is_some_and(|n| !n.flags.deletable) {
            tracing::debug!("Ignoring canvas removal of locked node '{}'", id);
            return None;
        }
        let removed = self.store.remove_node(id)?;
        self.committed();
        Some(removed)
    }

    /// Canvas connect; ignored when either endpoint is not connectable
    pub fn connect(&mut self, source: &str, target: &str, metadata: EdgeMetadata) -> Option<Edge> {
        let blocked = [source, target]
            .iter()
            .any(|id| self.store.node(id).is_some_and(|n| !n.flags.connectable));
        if blocked {
            tracing::debug!("Ignoring connection '{}' -> '{}' to locked node", source, target);
            return None;
        }
        let edge = self.store.add_edge(source, target, metadata)?;
        self.committed();
        Some(edge)
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Option<Edge> {
        let edge = self.store.remove_edge(edge_id)?;
        self.committed();
        Some(edge)
    }

    pub fn copy_node(&self, id: &str) -> Option<NodeSnapshot> {
        self.store.copy_node(id)
    }

    pub fn cut_node(&mut self, id: &str) -> Option<NodeSnapshot> {
        if self.store.node(id).is_some_and(|n| !n.flags.deletable) {
            tracing::debug!("Ignoring cut of locked node '{}'", id);
            return None;
        }
        let snapshot = self.store.cut_node(id)?;
        self.committed();
        Some(snapshot)
    }

    pub fn paste_node(&mut self, snapshot: &NodeSnapshot, position: Position) -> FlowNode {
        let node = self.store.paste_node(snapshot, position);
        self.committed();
        node
    }

    // Task list affordances

    /// Drop every edge touching `id`, demoting it to the unordered partition
    pub fn break_from_order(&mut self, id: &str) -> usize {
        let removed = self.store.remove_incident_edges(id);
        if removed > 0 {
            tracing::debug!("Broke '{}' from order, removed {} edge(s)", id, removed);
            self.committed();
        }
        removed
    }

    pub fn move_task_before(&mut self, id: &str, anchor: &str) -> bool {
        let moved = self.order.move_before(id, anchor);
        if moved {
            self.refresh_order();
        }
        moved
    }

    pub fn move_task_after(&mut self, id: &str, anchor: &str) -> bool {
        let moved = self.order.move_after(id, anchor);
        if moved {
            self.refresh_order();
        }
        moved
    }

    pub fn move_task_to(&mut self, id: &str, index: usize) -> bool {
        let moved = self.order.move_to(id, index);
        if moved {
            self.refresh_order();
        }
        moved
    }

    /// Discard manual reordering and adopt the pure linearization
    pub fn reset_order(&mut self) {
        self.order.reset();
        self.refresh_order();
    }

    /// Flip completion; returns the new state, `None` for an unknown node
    pub fn toggle_complete(&mut self, id: &str) -> Option<bool> {
        let mut flags = self.store.node(id)?.flags;
        let complete = self.completion.toggle(id);
        flags.set_interactive(!complete);
        self.store.set_node_flags(id, flags);
        self.committed();
        Some(complete)
    }

    /// List delete; works for completed nodes too
    pub fn delete_from_list(&mut self, id: &str) -> Option<FlowNode> {
        let removed = self.store.remove_node(id)?;
        self.committed();
        Some(removed)
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = tag.into();
        self.committed();
    }

    /// Abandon the current document and start a blank one
    pub fn new_document(&mut self) {
        self.persistence.start_new_session();
        self.apply_document(Graph::default(), String::new(), Vec::new());
    }

    // Remote operations

    /// Load `id`: cached copy first, then the remote copy
    pub async fn load(&mut self, id: &str) -> Result<LoadOutcome, PersistenceError> {
        let pending = self.begin_load(id);
        let response = self.remote().load(id).await;
        self.complete_load(pending, response)
    }

    /// Phase 1 of a load; applies a cache hit immediately
    pub fn begin_load(&mut self, id: &str) -> PendingLoad {
        let mut pending = self.persistence.begin_load(id);
        if let Some(record) = pending.cached().cloned() {
            tracing::debug!("Showing cached copy of {} while loading", id);
            self.apply_document(record.graph(), record.tag, record.completed);
        }
        pending.set_base_revision(self.store.revision());
        pending
    }

    /// Phase 2 of a load; applies the remote copy when it should win
    pub fn complete_load(
        &mut self,
        pending: PendingLoad,
        response: Result<RemoteDocument, PersistenceError>,
    ) -> Result<LoadOutcome, PersistenceError> {
        let current = self.store.graph();
        let outcome = self.persistence.complete_load(
            pending,
            response,
            &current,
            &self.tag,
            self.store.revision(),
        )?;

        if let LoadOutcome::Replaced(document) = &outcome {
            self.apply_document(
                document.graph(),
                document.tag.clone(),
                document.completed.clone(),
            );
        }
        Ok(outcome)
    }

    /// Save under the active identifier
    pub async fn save(&mut self, tag: &str) -> Result<SaveReceipt, PersistenceError> {
        self.save_to(SaveTarget::Current, tag).await
    }

    /// Save under a freshly generated identifier
    pub async fn save_as_new(&mut self, tag: &str) -> Result<SaveReceipt, PersistenceError> {
        self.save_to(SaveTarget::New, tag).await
    }

    async fn save_to(
        &mut self,
        target: SaveTarget,
        tag: &str,
    ) -> Result<SaveReceipt, PersistenceError> {
        let pending = self.prepare_save(target, tag)?;
        let response = self.remote().save(pending.request().clone()).await;
        let receipt = self.finish_save(pending, response)?;

        if let Err(e) = self.persistence.refresh_documents().await {
            tracing::warn!("Saved, but refreshing the documents list failed: {}", e);
        }
        Ok(receipt)
    }

    /// Phase 1 of a save; reads the latest in-memory state
    pub fn prepare_save(
        &self,
        target: SaveTarget,
        tag: &str,
    ) -> Result<PendingSave, PersistenceError> {
        self.persistence.prepare_save(
            target,
            &self.store.graph(),
            tag,
            self.completion.to_vec(),
            self.store.revision(),
        )
    }

    /// Phase 2 of a save
    pub fn finish_save(
        &mut self,
        pending: PendingSave,
        response: Result<crate::models::SaveResponse, PersistenceError>,
    ) -> Result<SaveReceipt, PersistenceError> {
        let tag = pending.tag().to_string();
        let receipt = self
            .persistence
            .finish_save(pending, response, self.store.revision())?;

        if self.persistence.active_id() == receipt.uuid {
            self.tag = tag;
            if receipt.has_newer_edits {
                // Re-home edits made during the save under the durable key
                self.autosave_now();
            } else {
                self.store.mark_clean();
            }
        }
        Ok(receipt)
    }

    /// Delete a saved document; deleting the open one resets the session
    pub async fn delete_document(&mut self, id: &str) -> Result<DeleteOutcome, PersistenceError> {
        let outcome = self.persistence.delete(id).await?;
        if outcome.session_reset {
            tracing::info!("Open document {} was deleted, starting a blank one", id);
            self.apply_document(Graph::default(), String::new(), Vec::new());
        }
        Ok(outcome)
    }

    /// Refresh and return the saved-documents list
    pub async fn list_documents(&mut self) -> Result<Vec<DocumentSummary>, PersistenceError> {
        let documents = self.persistence.refresh_documents().await?;
        Ok(documents.to_vec())
    }

    /// Case-insensitive tag filter over the last fetched list, newest first
    pub fn filter_documents(&self, query: &str) -> Vec<DocumentSummary> {
        self.persistence.filter_documents(query)
    }

    /// Upload a file for an image or attachment node and link it in
    pub async fn attach_upload(
        &mut self,
        node_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, PersistenceError> {
        let node_type = self
            .store
            .node(node_id)
            .map(|n| n.node_type)
            .ok_or_else(|| PersistenceError::validation(format!("no node '{}'", node_id)))?;
        if !node_type.accepts_upload() {
            return Err(PersistenceError::validation(format!(
                "{} nodes do not take uploads",
                node_type
            )));
        }

        let response = self.remote().upload(file_name, bytes).await?;
        if !response.success {
            return Err(PersistenceError::transport(format!(
                "upload of '{}' was not accepted",
                file_name
            )));
        }

        let mut data = NodeData::new();
        match node_type {
            NodeType::Image => {
                data.insert("imageUrl".to_string(), Value::String(response.url.clone()));
            }
            _ => {
                data.insert("fileUrl".to_string(), Value::String(response.url.clone()));
                data.insert(
                    "fileName".to_string(),
                    Value::String(response.file_name.clone()),
                );
            }
        }
        // The node may have been removed while the upload was in flight
        self.update_node_data(node_id, data);
        Ok(response)
    }

    // Internals

    /// Drain the store's change feed; true if any change was structural
    fn drain_changes(&mut self) -> bool {
        let mut structural = false;
        loop {
            match self.changes.try_recv() {
                Ok(event) => structural |= event.is_structural(),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::debug!("Change feed lagged by {} event(s)", skipped);
                    structural = true;
                }
                Err(_) => break,
            }
        }
        structural
    }

    fn committed(&mut self) {
        if self.drain_changes() {
            self.completion.retain_existing(self.store.nodes());
            self.refresh_order();
        }
        if self.autosave {
            self.autosave_now();
        }
    }

    fn refresh_order(&mut self) {
        self.task_order = self.order.reconcile(self.store.nodes(), self.store.edges());
    }

    fn autosave_now(&mut self) {
        let graph = self.store.graph();
        self.persistence
            .autosave(&graph, &self.tag, self.completion.to_vec());
        self.store.mark_clean();
    }

    fn apply_document(&mut self, graph: Graph, tag: String, completed: Vec<String>) {
        self.store.replace_graph(graph);
        self.drain_changes();
        self.store.mark_clean();
        self.tag = tag;
        self.completion = CompletionState::from_ids(completed);
        self.completion.retain_existing(self.store.nodes());
        self.order.reset();
        self.refresh_order();
    }
}
