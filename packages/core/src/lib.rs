//! Flowlist Core
//!
//! Graph and persistence engine behind a visual flow editor: users place
//! typed nodes on a canvas, connect them with directed edges, and the engine
//! derives a task list from the graph structure.
//!
//! # Architecture
//!
//! - **Single source of truth**: `GraphStore` owns nodes and edges and
//!   enforces referential integrity on every mutation
//! - **Pure ordering**: the linearizer is a total function of (nodes, edges)
//! - **Reconciled manual order**: user reordering survives unrelated edits
//! - **Two-phase persistence**: synchronous cache write, then asynchronous
//!   remote reconciliation guarded against stale responses
//!
//! # Modules
//!
//! - [`models`] - Data structures (FlowNode, Edge, CacheRecord, etc.)
//! - [`services`] - GraphStore, linearizer, task ordering, persistence, session
//! - [`db`] - Local cache, remote store and credential collaborators
//! - [`config`] - Session configuration

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{ConfigError, FlowConfig};
pub use models::*;
pub use services::*;
