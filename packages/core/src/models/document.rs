//! Persistence Records
//!
//! Shapes exchanged with the local cache and the remote document store.
//! Field names are camelCase to match what the browser-side collaborators
//! already read and write.
//!
//! - [`CacheRecord`] - `{nodes, edges, tag, savedAt}` stored under `<namespace>:<graphId>`
//! - [`SavedDocument`] - a named remote snapshot with created/updated timestamps
//! - [`DocumentSummary`] - one row of the saved-documents list

use super::{Edge, FlowNode, Graph, ValidationError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Local cache entry for one graph identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<Edge>,

    #[serde(default)]
    pub tag: String,

    /// Epoch milliseconds; entries without a valid value are purged
    #[serde(default)]
    pub saved_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub completed: Vec<String>,
}

impl CacheRecord {
    pub fn new(
        graph: &Graph,
        tag: impl Into<String>,
        completed: Vec<String>,
        saved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            nodes: graph.nodes.clone(),
            edges: graph.edges.clone(),
            tag: tag.into(),
            saved_at: Some(saved_at.timestamp_millis()),
            completed,
        }
    }

    /// Parse a raw cache value and run the structural shape check
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let record: CacheRecord = serde_json::from_str(raw)
            .map_err(|e| ValidationError::InvalidRecord(e.to_string()))?;

        if record.saved_time().is_none() {
            return Err(ValidationError::InvalidRecord(
                "missing or invalid savedAt".to_string(),
            ));
        }

        let mut graph = record.graph();
        graph.validate()?;
        if graph.prune_dangling_edges() > 0 {
            return Err(ValidationError::InvalidRecord(
                "edge references a missing node".to_string(),
            ));
        }
        Ok(record)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn saved_time(&self) -> Option<DateTime<Utc>> {
        match self.saved_at {
            Some(ms) if ms > 0 => Utc.timestamp_millis_opt(ms).single(),
            _ => None,
        }
    }

    /// Older than `retention` relative to `now`, or carrying no usable timestamp
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        match self.saved_time() {
            Some(saved) => now.signed_duration_since(saved) > retention,
            None => true,
        }
    }

    pub fn graph(&self) -> Graph {
        Graph::new(self.nodes.clone(), self.edges.clone())
    }
}

/// A named remote snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDocument {
    pub tag: String,
    pub uuid: String,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<Edge>,

    #[serde(default)]
    pub completed: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedDocument {
    pub fn graph(&self) -> Graph {
        Graph::new(self.nodes.clone(), self.edges.clone())
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            tag: self.tag.clone(),
            uuid: self.uuid.clone(),
            created_time: self.created_at,
        }
    }
}

/// Saved-documents list row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub tag: String,
    pub uuid: String,
    pub created_time: DateTime<Utc>,
}

/// Keep the first summary seen for each uuid
pub fn dedupe_by_uuid(documents: Vec<DocumentSummary>) -> Vec<DocumentSummary> {
    let mut seen = HashSet::new();
    documents
        .into_iter()
        .filter(|doc| seen.insert(doc.uuid.clone()))
        .collect()
}

/// Case-insensitive substring match on the tag, newest first
pub fn filter_documents(documents: &[DocumentSummary], query: &str) -> Vec<DocumentSummary> {
    let needle = query.trim().to_lowercase();
    let mut matches: Vec<DocumentSummary> = documents
        .iter()
        .filter(|doc| needle.is_empty() || doc.tag.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    matches.sort_by(|a, b| b.created_time.cmp(&a.created_time));
    matches
}

// Remote store request/response shapes

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<Edge>,
    pub tag: String,
    pub uuid: String,

    #[serde(default)]
    pub completed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    pub message: String,
}

/// Response to a load-by-uuid request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<Edge>,
    pub tag: String,
    pub uuid: String,

    #[serde(default)]
    pub completed: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteDocument {
    pub fn graph(&self) -> Graph {
        Graph::new(self.nodes.clone(), self.edges.clone())
    }
}

impl From<SavedDocument> for RemoteDocument {
    fn from(doc: SavedDocument) -> Self {
        Self {
            nodes: doc.nodes,
            edges: doc.edges,
            tag: doc.tag,
            uuid: doc.uuid,
            completed: doc.completed,
            created_at: Some(doc.created_at),
            updated_at: Some(doc.updated_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub file_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EdgeMetadata, NodeType, Position};
    use serde_json::{json, Map};

    fn sample_graph() -> Graph {
        Graph::new(
            vec![
                FlowNode::new("1", NodeType::Text, Position::new(0.0, 0.0), Map::new()),
                FlowNode::new("2", NodeType::Image, Position::new(50.0, 0.0), Map::new()),
            ],
            vec![Edge::new("e1", "1", "2", EdgeMetadata::default())],
        )
    }

    #[test]
    fn test_cache_record_round_trip() {
        let graph = sample_graph();
        let record = CacheRecord::new(&graph, "Launch", vec!["2".to_string()], Utc::now());

        let raw = record.to_json().unwrap();
        let parsed = CacheRecord::parse(&raw).unwrap();

        assert_eq!(parsed.graph(), graph);
        assert_eq!(parsed.tag, "Launch");
        assert_eq!(parsed.completed, vec!["2".to_string()]);
    }

    #[test]
    fn test_cache_record_wire_format() {
        let record = CacheRecord::new(&sample_graph(), "t", vec![], Utc::now());
        let value = serde_json::to_value(&record).unwrap();

        assert!(value.get("savedAt").unwrap().is_i64());
        assert!(value.get("completed").is_none());
        assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_rejects_missing_timestamp() {
        let raw = json!({ "nodes": [], "edges": [], "tag": "x" }).to_string();
        assert!(matches!(
            CacheRecord::parse(&raw),
            Err(ValidationError::InvalidRecord(_))
        ));

        let raw = json!({ "nodes": [], "edges": [], "tag": "x", "savedAt": 0 }).to_string();
        assert!(CacheRecord::parse(&raw).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CacheRecord::parse("{not json").is_err());
        assert!(CacheRecord::parse(r#"{"nodes": 3, "edges": [], "savedAt": 5}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_dangling_edge() {
        let raw = json!({
            "nodes": [],
            "edges": [{ "id": "e1", "source": "1", "target": "2" }],
            "savedAt": 1_700_000_000_000i64
        })
        .to_string();
        assert!(CacheRecord::parse(&raw).is_err());
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let retention = Duration::days(7);

        let fresh = CacheRecord::new(&sample_graph(), "t", vec![], now - Duration::days(6));
        let stale = CacheRecord::new(&sample_graph(), "t", vec![], now - Duration::days(8));

        assert!(!fresh.is_expired(now, retention));
        assert!(stale.is_expired(now, retention));
    }

    fn summary(tag: &str, uuid: &str, days_ago: i64) -> DocumentSummary {
        DocumentSummary {
            tag: tag.to_string(),
            uuid: uuid.to_string(),
            created_time: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn test_filter_documents_substring_and_recency() {
        let docs = vec![
            summary("Weekly plan", "a", 3),
            summary("Groceries", "b", 1),
            summary("Release PLAN", "c", 0),
        ];

        let found = filter_documents(&docs, "plan");
        let uuids: Vec<&str> = found.iter().map(|d| d.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["c", "a"]);

        let all = filter_documents(&docs, "  ");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].uuid, "c");
    }

    #[test]
    fn test_dedupe_by_uuid_keeps_first() {
        let docs = vec![
            summary("First", "a", 0),
            summary("Second", "b", 0),
            summary("Duplicate", "a", 0),
        ];
        let deduped = dedupe_by_uuid(docs);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].tag, "First");
    }
}
