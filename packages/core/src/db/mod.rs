//! Storage Layer
//!
//! Collaborator contracts the core consumes, plus in-process
//! implementations of each:
//!
//! - [`KeyValueStore`] - local cache surface (`<namespace>:<graphId>` keys)
//! - [`RemoteStore`] - remote document store (save/load/delete/list/upload)
//! - [`CredentialProvider`] - authorization token source
//! - [`GraphEvent`] - change notifications broadcast by the graph store

mod auth;
mod cache;
mod error;
pub mod events;
mod remote;

pub use auth::{Credential, CredentialProvider, StaticCredentials};
pub use cache::{
    open_cache, CacheKeys, FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, SCRATCH_KEY,
};
pub use error::{CacheError, RemoteError};
pub use events::GraphEvent;
pub use remote::{MemoryRemoteStore, RemoteStore};
