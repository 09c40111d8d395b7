//! Persistence Coordinator
//!
//! Mirrors the graph into the local cache and drives explicit remote
//! load/save/delete/list.
//!
//! # Two-phase protocol
//!
//! 1. **Local**: every mutation is written synchronously to the cache under
//!    `<namespace>:<graphId>` (or `<namespace>:new` while the session has no
//!    durable identifier) and flags the session as having unsaved changes.
//! 2. **Remote**: network calls run through a detached [`RemoteHandle`] so
//!    local edits keep flowing while a request is outstanding. Each request
//!    carries a ticket ([`PendingLoad`] / [`PendingSave`]) recording the
//!    session generation and graph revision it started from; a response is
//!    only applied if its ticket still matches the active session.
//!
//! Every operation resolves to a value or a [`PersistenceError`]. Failures
//! leave the in-memory state as it was, except where the cache fallback is
//! documented (a failed load keeps showing the cached copy).

use super::PersistenceError;
use crate::config::FlowConfig;
use crate::db::{
    CacheKeys, Credential, CredentialProvider, KeyValueStore, RemoteError, RemoteStore,
};
use crate::models::{
    filter_documents, CacheRecord, DeleteResponse, DocumentSummary, Graph, RemoteDocument,
    SaveRequest, SaveResponse, UploadResponse,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Shown by the host before it discards a session with unsaved changes
pub const UNSAVED_CHANGES_WARNING: &str =
    "You have unsaved changes. Leaving now will discard them.";

/// Detached access to the remote store
///
/// Cloning is cheap. Requests made through a handle do not borrow the
/// session, so graph mutations can continue while they are in flight.
#[derive(Clone)]
pub struct RemoteHandle {
    remote: Arc<dyn RemoteStore + Send + Sync>,
    credentials: Arc<dyn CredentialProvider + Send + Sync>,
}

impl RemoteHandle {
    pub fn new(
        remote: Arc<dyn RemoteStore + Send + Sync>,
        credentials: Arc<dyn CredentialProvider + Send + Sync>,
    ) -> Self {
        Self {
            remote,
            credentials,
        }
    }

    /// Current credential, or a deferred operation plus a re-auth request
    fn credential(&self) -> Result<Credential, PersistenceError> {
        match self.credentials.credential() {
            Some(credential) if !credential.is_expired(Utc::now()) => Ok(credential),
            Some(_) => {
                self.credentials.request_reauthentication();
                Err(PersistenceError::authentication_required(
                    "credential expired",
                ))
            }
            None => {
                self.credentials.request_reauthentication();
                Err(PersistenceError::authentication_required(
                    "no credential available",
                ))
            }
        }
    }

    fn map_remote_error(&self, err: RemoteError) -> PersistenceError {
        if matches!(err, RemoteError::Unauthorized(_)) {
            self.credentials.request_reauthentication();
        }
        err.into()
    }

    pub async fn load(&self, id: &str) -> Result<RemoteDocument, PersistenceError> {
        let credential = self.credential()?;
        self.remote
            .load(&credential, id)
            .await
            .map_err(|e| self.map_remote_error(e))
    }

    pub async fn save(&self, request: SaveRequest) -> Result<SaveResponse, PersistenceError> {
        let credential = self.credential()?;
        let response = self
            .remote
            .save(&credential, request)
            .await
            .map_err(|e| self.map_remote_error(e))?;

        if !response.success {
            return Err(PersistenceError::transport(response.message));
        }
        Ok(response)
    }

    pub async fn delete(&self, id: &str) -> Result<DeleteResponse, PersistenceError> {
        let credential = self.credential()?;
        self.remote
            .delete(&credential, id)
            .await
            .map_err(|e| self.map_remote_error(e))
    }

    pub async fn list(&self) -> Result<Vec<DocumentSummary>, PersistenceError> {
        let credential = self.credential()?;
        self.remote
            .list_tags(&credential)
            .await
            .map_err(|e| self.map_remote_error(e))
    }

    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, PersistenceError> {
        let credential = self.credential()?;
        self.remote
            .upload(&credential, file_name, bytes)
            .await
            .map_err(|e| self.map_remote_error(e))
    }
}

/// Which identifier a save is written under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    /// The active session identifier
    Current,
    /// A freshly generated identifier
    New,
}

/// Ticket for an in-flight load
#[derive(Debug, Clone)]
pub struct PendingLoad {
    id: String,
    generation: u64,
    cached: Option<CacheRecord>,
    base_revision: u64,
}

impl PendingLoad {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cache entry applied optimistically, if there was one
    pub fn cached(&self) -> Option<&CacheRecord> {
        self.cached.as_ref()
    }

    /// Record the graph revision after the optimistic apply
    pub fn set_base_revision(&mut self, revision: u64) {
        self.base_revision = revision;
    }
}

/// Ticket for an in-flight save
#[derive(Debug, Clone)]
pub struct PendingSave {
    request: SaveRequest,
    generation: u64,
    base_revision: u64,
}

impl PendingSave {
    pub fn uuid(&self) -> &str {
        &self.request.uuid
    }

    pub fn tag(&self) -> &str {
        &self.request.tag
    }

    pub fn request(&self) -> &SaveRequest {
        &self.request
    }
}

/// How a completed load was reconciled with the session
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Remote copy differs (or nothing was shown yet); apply it
    Replaced(RemoteDocument),
    /// Remote copy matches what is shown
    UpToDate,
    /// Local edits were made while the load was in flight; they are kept
    LocalEditsKept,
    /// Remote failed but the cached copy stays active
    OutOfSync(PersistenceError),
    /// The session moved on; the response was discarded
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub uuid: String,
    pub message: String,
    /// Edits made while the save was in flight are still unsaved
    pub has_newer_edits: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// The remote store no longer had the document
    pub already_absent: bool,
    /// The deleted document was open; the session was reset
    pub session_reset: bool,
}

pub struct PersistenceCoordinator {
    cache: Arc<dyn KeyValueStore + Send + Sync>,
    handle: RemoteHandle,
    keys: CacheKeys,
    retention: Duration,
    active_id: String,
    durable: bool,
    unsaved_changes: bool,
    generation: u64,
    documents: Vec<DocumentSummary>,
}

impl PersistenceCoordinator {
    pub fn new(
        config: &FlowConfig,
        cache: Arc<dyn KeyValueStore + Send + Sync>,
        remote: Arc<dyn RemoteStore + Send + Sync>,
        credentials: Arc<dyn CredentialProvider + Send + Sync>,
    ) -> Self {
        Self {
            cache,
            handle: RemoteHandle::new(remote, credentials),
            keys: CacheKeys::new(config.cache_namespace.clone()),
            retention: config.cache_retention(),
            active_id: Uuid::new_v4().to_string(),
            durable: false,
            unsaved_changes: false,
            generation: 0,
            documents: Vec::new(),
        }
    }

    pub fn remote(&self) -> RemoteHandle {
        self.handle.clone()
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    /// Whether the active identifier has been saved remotely
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    /// Flag state restored from the scratch entry as unsaved
    pub fn mark_unsaved(&mut self) {
        self.unsaved_changes = true;
    }

    /// Warning the host should show before discarding the session
    pub fn unload_warning(&self) -> Option<&'static str> {
        self.unsaved_changes.then_some(UNSAVED_CHANGES_WARNING)
    }

    pub fn documents(&self) -> &[DocumentSummary] {
        &self.documents
    }

    pub fn filter_documents(&self, query: &str) -> Vec<DocumentSummary> {
        filter_documents(&self.documents, query)
    }

    pub fn cache_keys(&self) -> &CacheKeys {
        &self.keys
    }

    /// Abandon the current identifier and start an unsaved session
    ///
    /// In-flight loads and saves for the old session become stale.
    pub fn start_new_session(&mut self) -> &str {
        self.active_id = Uuid::new_v4().to_string();
        self.durable = false;
        self.unsaved_changes = false;
        self.generation += 1;
        self.evict_key(&self.keys.scratch());
        tracing::debug!("Started new session {}", self.active_id);
        &self.active_id
    }

    /// Key the next autosave is written under
    pub fn autosave_key(&self) -> String {
        if self.durable {
            self.keys.for_graph(&self.active_id)
        } else {
            self.keys.scratch()
        }
    }

    /// Phase 1: mirror the latest state into the local cache
    pub fn autosave(&mut self, graph: &Graph, tag: &str, completed: Vec<String>) {
        self.unsaved_changes = true;

        let key = self.autosave_key();
        let record = CacheRecord::new(graph, tag, completed, Utc::now());
        let written = record
            .to_json()
            .map_err(crate::db::CacheError::from)
            .and_then(|raw| self.cache.set(&key, &raw));

        if let Err(e) = written {
            tracing::warn!("Autosave to '{}' failed: {}", key, e);
        }
    }

    /// Cached record for `graph_id`; corrupt or expired entries are purged
    pub fn read_cache(&self, graph_id: &str) -> Option<CacheRecord> {
        self.read_key(&self.keys.for_graph(graph_id), Utc::now())
    }

    /// Scratch state of a session that was never saved
    pub fn read_scratch(&self) -> Option<CacheRecord> {
        self.read_key(&self.keys.scratch(), Utc::now())
    }

    fn read_key(&self, key: &str, now: DateTime<Utc>) -> Option<CacheRecord> {
        let raw = match self.cache.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Cache read for '{}' failed: {}", key, e);
                return None;
            }
        };

        match CacheRecord::parse(&raw) {
            Ok(record) if !record.is_expired(now, self.retention) => Some(record),
            Ok(_) => {
                tracing::info!("Purging expired cache entry '{}'", key);
                self.evict_key(key);
                None
            }
            Err(e) => {
                let corrupt = PersistenceError::corrupt_cache(key, e.to_string());
                tracing::warn!("{}; purging", corrupt);
                self.evict_key(key);
                None
            }
        }
    }

    fn evict_key(&self, key: &str) {
        if let Err(e) = self.cache.remove(key) {
            tracing::warn!("Failed to evict cache entry '{}': {}", key, e);
        }
    }

    pub fn evict(&self, graph_id: &str) {
        self.evict_key(&self.keys.for_graph(graph_id));
    }

    /// Startup sweep: drop expired, undated and unparseable entries
    pub fn purge_expired_cache(&self) -> usize {
        self.purge_expired_cache_at(Utc::now())
    }

    pub fn purge_expired_cache_at(&self, now: DateTime<Utc>) -> usize {
        let keys = match self.cache.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Cache sweep skipped, listing keys failed: {}", e);
                return 0;
            }
        };

        let mut purged = 0;
        for key in keys.iter().filter(|k| self.keys.graph_id(k).is_some()) {
            let present = matches!(self.cache.get(key), Ok(Some(_)));
            if present && self.read_key(key, now).is_none() {
                purged += 1;
            }
        }

        if purged > 0 {
            tracing::info!("Purged {} stale cache entr(ies)", purged);
        }
        purged
    }

    /// Start loading `id`: read the cache and issue a ticket
    ///
    /// With a cache hit the session switches to `id` immediately and the
    /// caller applies the cached record. Without one the active session is
    /// left alone until the remote answers.
    pub fn begin_load(&mut self, id: &str) -> PendingLoad {
        self.generation += 1;
        let cached = self.read_cache(id);

        if cached.is_some() {
            self.active_id = id.to_string();
            self.durable = true;
            self.unsaved_changes = true;
        }

        PendingLoad {
            id: id.to_string(),
            generation: self.generation,
            cached,
            base_revision: 0,
        }
    }

    /// Phase 2 result of a load
    ///
    /// `current`/`current_tag`/`current_revision` describe what the session
    /// shows right now.
    pub fn complete_load(
        &mut self,
        pending: PendingLoad,
        response: Result<RemoteDocument, PersistenceError>,
        current: &Graph,
        current_tag: &str,
        current_revision: u64,
    ) -> Result<LoadOutcome, PersistenceError> {
        let switched_away = pending.cached.is_some() && self.active_id != pending.id;
        if pending.generation != self.generation || switched_away {
            tracing::debug!("Discarding stale load response for {}", pending.id);
            return Ok(LoadOutcome::Stale);
        }

        let document = match response {
            Ok(document) => document,
            Err(err) if pending.cached.is_some() => {
                tracing::warn!("Load of {} failed, keeping cached copy: {}", pending.id, err);
                return Ok(LoadOutcome::OutOfSync(PersistenceError::sync_conflict(
                    &pending.id,
                    err.to_string(),
                )));
            }
            Err(err) => {
                tracing::warn!("Load of {} failed with no cached copy: {}", pending.id, err);
                return Err(err);
            }
        };

        if current_revision != pending.base_revision {
            tracing::debug!(
                "Local edits made while loading {}; keeping them",
                pending.id
            );
            if pending.cached.is_none() {
                // Remember the remote copy so the next load can show it at once
                self.write_cache(&pending.id, &document);
            }
            return Ok(LoadOutcome::LocalEditsKept);
        }

        self.active_id = pending.id.clone();
        self.durable = true;
        self.unsaved_changes = false;
        self.evict_key(&self.keys.scratch());

        let differs = pending.cached.is_none()
            || document.nodes.len() != current.nodes.len()
            || document.edges.len() != current.edges.len()
            || document.tag != current_tag;

        if !differs {
            return Ok(LoadOutcome::UpToDate);
        }

        self.write_cache(&pending.id, &document);
        Ok(LoadOutcome::Replaced(document))
    }

    fn write_cache(&self, graph_id: &str, document: &RemoteDocument) {
        let record = CacheRecord::new(
            &document.graph(),
            document.tag.clone(),
            document.completed.clone(),
            Utc::now(),
        );
        match record.to_json() {
            Ok(raw) => {
                if let Err(e) = self.cache.set(&self.keys.for_graph(graph_id), &raw) {
                    tracing::warn!("Failed to refresh cache for {}: {}", graph_id, e);
                }
            }
            Err(e) => tracing::warn!("Failed to encode cache record: {}", e),
        }
    }

    /// Validate and build a save request from the latest in-memory state
    ///
    /// Nothing is sent; validation failures never reach the network.
    pub fn prepare_save(
        &self,
        target: SaveTarget,
        graph: &Graph,
        tag: &str,
        completed: Vec<String>,
        revision: u64,
    ) -> Result<PendingSave, PersistenceError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(PersistenceError::validation("a tag is required to save"));
        }
        if graph.is_empty() {
            return Err(PersistenceError::validation(
                "cannot save a graph without nodes",
            ));
        }

        let uuid = match target {
            SaveTarget::Current => self.active_id.clone(),
            SaveTarget::New => Uuid::new_v4().to_string(),
        };

        Ok(PendingSave {
            request: SaveRequest {
                nodes: graph.nodes.clone(),
                edges: graph.edges.clone(),
                tag: tag.to_string(),
                uuid,
                completed,
            },
            generation: self.generation,
            base_revision: revision,
        })
    }

    /// Phase 2 result of a save
    pub fn finish_save(
        &mut self,
        pending: PendingSave,
        response: Result<SaveResponse, PersistenceError>,
        current_revision: u64,
    ) -> Result<SaveReceipt, PersistenceError> {
        let response = response.map_err(|e| {
            tracing::warn!("Save of {} failed: {}", pending.request.uuid, e);
            e
        })?;

        let uuid = pending.request.uuid;
        let has_newer_edits = current_revision != pending.base_revision;

        if pending.generation != self.generation {
            tracing::debug!("Save of {} finished after the session moved on", uuid);
            if self.active_id != uuid {
                self.evict_key(&self.keys.for_graph(&uuid));
            }
            return Ok(SaveReceipt {
                uuid,
                message: response.message,
                has_newer_edits: false,
            });
        }

        self.evict_key(&self.keys.for_graph(&uuid));
        self.evict_key(&self.keys.scratch());
        self.active_id = uuid.clone();
        self.durable = true;
        self.unsaved_changes = has_newer_edits;

        tracing::info!("Saved document {}", uuid);
        Ok(SaveReceipt {
            uuid,
            message: response.message,
            has_newer_edits,
        })
    }

    /// Save the given state and refresh the documents list
    pub async fn save(
        &mut self,
        target: SaveTarget,
        graph: &Graph,
        tag: &str,
        completed: Vec<String>,
        revision: u64,
    ) -> Result<SaveReceipt, PersistenceError> {
        let pending = self.prepare_save(target, graph, tag, completed, revision)?;
        let response = self.handle.save(pending.request.clone()).await;
        let receipt = self.finish_save(pending, response, revision)?;

        if let Err(e) = self.refresh_documents().await {
            tracing::warn!("Saved, but refreshing the documents list failed: {}", e);
        }
        Ok(receipt)
    }

    /// Remove a document remotely and locally
    ///
    /// A document the remote store no longer has counts as deleted.
    pub async fn delete(&mut self, id: &str) -> Result<DeleteOutcome, PersistenceError> {
        let already_absent = match self.handle.delete(id).await {
            Ok(_) => false,
            Err(PersistenceError::NotFound { .. }) => {
                tracing::debug!("Document {} already absent remotely", id);
                true
            }
            Err(e) => {
                tracing::warn!("Delete of {} failed: {}", id, e);
                return Err(e);
            }
        };

        self.evict(id);
        self.documents.retain(|d| d.uuid != id);

        let session_reset = self.active_id == id;
        if session_reset {
            self.start_new_session();
        }

        Ok(DeleteOutcome {
            already_absent,
            session_reset,
        })
    }

    /// Fetch the saved-documents list
    pub async fn refresh_documents(&mut self) -> Result<&[DocumentSummary], PersistenceError> {
        let documents = self.handle.list().await?;
        self.documents = crate::models::dedupe_by_uuid(documents);
        Ok(&self.documents)
    }
}
