use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

use super::{Credential, RemoteError};
use crate::models::{
    dedupe_by_uuid, DeleteResponse, DocumentSummary, RemoteDocument, SaveRequest, SaveResponse,
    SavedDocument, UploadResponse,
};

/// Request/response contract of the remote document store
///
/// Every call carries the caller's credential. Saving under an existing
/// uuid supersedes the stored copy; it never merges.
#[async_trait]
pub trait RemoteStore {
    async fn save(
        &self,
        credential: &Credential,
        request: SaveRequest,
    ) -> Result<SaveResponse, RemoteError>;
    async fn load(&self, credential: &Credential, uuid: &str)
        -> Result<RemoteDocument, RemoteError>;
    async fn delete(&self, credential: &Credential, uuid: &str)
        -> Result<DeleteResponse, RemoteError>;
    async fn list_tags(&self, credential: &Credential)
        -> Result<Vec<DocumentSummary>, RemoteError>;
    async fn upload(
        &self,
        credential: &Credential,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, RemoteError>;
}

// In-memory implementation for tests and offline development
pub struct MemoryRemoteStore {
    documents: Arc<Mutex<HashMap<String, SavedDocument>>>,
    archive: Arc<Mutex<Vec<SavedDocument>>>,
    uploads: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    offline: AtomicBool,
    requests: AtomicUsize,
    simulate_delays: bool,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(Mutex::new(HashMap::new())),
            archive: Arc::new(Mutex::new(Vec::new())),
            uploads: Arc::new(Mutex::new(HashMap::new())),
            offline: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            simulate_delays: false,
        }
    }

    /// Adds a short latency to every call
    pub fn with_delays() -> Self {
        Self {
            simulate_delays: true,
            ..Self::new()
        }
    }

    pub fn with_documents(documents: Vec<SavedDocument>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.documents.lock() {
            for doc in documents {
                map.insert(doc.uuid.clone(), doc);
            }
        }
        store
    }

    /// While offline every call fails with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of requests that reached the store, including failed ones
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn document(&self, uuid: &str) -> Option<SavedDocument> {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(uuid).cloned())
    }

    /// Superseded versions, oldest first
    pub fn archived(&self, uuid: &str) -> Vec<SavedDocument> {
        self.archive
            .lock()
            .map(|archive| archive.iter().filter(|d| d.uuid == uuid).cloned().collect())
            .unwrap_or_default()
    }

    async fn begin_request(&self, credential: &Credential) -> Result<(), RemoteError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if self.simulate_delays {
            sleep(Duration::from_millis(50)).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::transport("remote store unreachable"));
        }
        if credential.is_expired(Utc::now()) {
            return Err(RemoteError::unauthorized("credential expired"));
        }
        Ok(())
    }

    fn lock_error() -> RemoteError {
        RemoteError::transport("Failed to acquire lock")
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn save(
        &self,
        credential: &Credential,
        request: SaveRequest,
    ) -> Result<SaveResponse, RemoteError> {
        self.begin_request(credential).await?;

        if request.uuid.is_empty() {
            return Err(RemoteError::rejected("uuid is required"));
        }

        let now = Utc::now();
        let mut documents = self.documents.lock().map_err(|_| Self::lock_error())?;

        let created_at = match documents.remove(&request.uuid) {
            Some(previous) => {
                let created_at = previous.created_at;
                self.archive
                    .lock()
                    .map_err(|_| Self::lock_error())?
                    .push(previous);
                created_at
            }
            None => now,
        };

        let message = format!("Saved '{}'", request.tag);
        documents.insert(
            request.uuid.clone(),
            SavedDocument {
                tag: request.tag,
                uuid: request.uuid,
                nodes: request.nodes,
                edges: request.edges,
                completed: request.completed,
                created_at,
                updated_at: now,
            },
        );

        Ok(SaveResponse {
            success: true,
            message,
        })
    }

    async fn load(
        &self,
        credential: &Credential,
        uuid: &str,
    ) -> Result<RemoteDocument, RemoteError> {
        self.begin_request(credential).await?;

        let documents = self.documents.lock().map_err(|_| Self::lock_error())?;
        documents
            .get(uuid)
            .cloned()
            .map(RemoteDocument::from)
            .ok_or_else(|| RemoteError::not_found(uuid))
    }

    async fn delete(
        &self,
        credential: &Credential,
        uuid: &str,
    ) -> Result<DeleteResponse, RemoteError> {
        self.begin_request(credential).await?;

        let mut documents = self.documents.lock().map_err(|_| Self::lock_error())?;
        let removed = documents
            .remove(uuid)
            .ok_or_else(|| RemoteError::not_found(uuid))?;

        self.archive
            .lock()
            .map_err(|_| Self::lock_error())?
            .push(removed);

        Ok(DeleteResponse {
            message: format!("Deleted {}", uuid),
        })
    }

    async fn list_tags(
        &self,
        credential: &Credential,
    ) -> Result<Vec<DocumentSummary>, RemoteError> {
        self.begin_request(credential).await?;

        let documents = self.documents.lock().map_err(|_| Self::lock_error())?;
        let mut summaries: Vec<DocumentSummary> =
            documents.values().map(SavedDocument::summary).collect();
        summaries.sort_by(|a, b| b.created_time.cmp(&a.created_time));
        Ok(dedupe_by_uuid(summaries))
    }

    async fn upload(
        &self,
        credential: &Credential,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, RemoteError> {
        self.begin_request(credential).await?;

        if bytes.is_empty() {
            return Err(RemoteError::rejected("empty upload"));
        }

        let key = format!("{}-{}", uuid::Uuid::new_v4(), file_name);
        let url = format!("memory://uploads/{}", key);
        self.uploads
            .lock()
            .map_err(|_| Self::lock_error())?
            .insert(key, bytes);

        Ok(UploadResponse {
            success: true,
            url,
            file_name: file_name.to_string(),
        })
    }
}
