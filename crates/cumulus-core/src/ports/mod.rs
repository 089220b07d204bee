//! Port definitions (trait interfaces for adapters)
//!
//! Ports follow the hexagonal architecture pattern: the domain is expressed
//! in traits here, and adapter crates provide the concrete implementations
//! (REST remote store, long-poll event feed, local filesystem vault, JSON
//! session store).

pub mod event_source;
pub mod local_vault;
pub mod remote_store;
pub mod session_store;

pub use event_source::{EventBatch, EventSource, WireEvent, WirePayload};
pub use local_vault::{LocalEntry, LocalVault, VaultFileState};
pub use remote_store::{Entry, EntryKind, MetadataPatch, RemoteStore};
pub use session_store::SessionStore;
