//! Business Services
//!
//! This module contains the core logic of the flow editor:
//!
//! - `GraphStore` - canonical node/edge collections and their mutations
//! - `linearizer` - deterministic task order via topological sort
//! - `TaskOrderController` - manual sequence layered over the linearization
//! - `PersistenceCoordinator` - local cache mirroring and remote load/save
//! - `FlowSession` - one editing session wiring the above together
//!
//! Graph mutations are synchronous and never fail; only persistence
//! operations are asynchronous and return [`PersistenceError`].

pub mod error;
pub mod graph_store;
pub mod linearizer;
pub mod persistence;
pub mod session;
pub mod task_order;

pub use error::{ErrorKind, PersistenceError, StructuredError};
pub use graph_store::{GraphStore, NodeIdGenerator, DEFAULT_EVENT_CAPACITY};
pub use persistence::{
    DeleteOutcome, LoadOutcome, PendingLoad, PendingSave, PersistenceCoordinator, RemoteHandle,
    SaveReceipt, SaveTarget, UNSAVED_CHANGES_WARNING,
};
pub use session::FlowSession;
pub use task_order::{CompletionState, TaskOrder, TaskOrderController};
