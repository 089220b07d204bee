//! Cumulus Sync - Bidirectional synchronization engine
//!
//! Provides:
//! - [`engine`] - the reconciler orchestrating push (scan) and pull (mirror) passes
//! - [`index`] - read model of the remote hierarchy with path resolution
//! - [`scheduler`] - periodic ticks, manual triggers, and debounced incremental passes
//! - [`events`] - the push-event channel with reconnect/backoff and a typed pub/sub bus
//! - [`locks`] - cooperative per-file editorial locks for "open for edit" sessions
//! - [`vault`] - local filesystem adapter (staged atomic writes, recursive walk)
//! - [`persist`] - JSON session-state store

pub mod engine;
pub mod events;
pub mod index;
pub mod locks;
pub mod persist;
pub mod scheduler;
pub mod vault;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

use cumulus_core::domain::errors::DomainError;
use cumulus_core::domain::grant::GrantError;

/// Errors that can occur during synchronization operations.
///
/// Nothing in this taxonomy is a crash: every variant is a recoverable
/// condition the caller decides how to handle, and per-file problems are
/// reported through `PassOutcome::failures` instead of surfacing here.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The local directory grant is no longer usable. Auto-sync stops
    /// cleanly; the caller must prompt the user to re-select a directory.
    #[error("Directory grant invalidated: {0}")]
    GrantInvalidated(String),

    /// A reconciliation pass was requested while one is already running.
    /// The request is rejected, not queued.
    #[error("A reconciliation pass is already in progress")]
    ConcurrentSyncInProgress,

    /// The remote store could not be reached or answered with an error
    /// outside any per-file context.
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// The event channel exhausted its reconnect budget and went dormant.
    #[error("Event channel degraded: {0}")]
    ChannelDegraded(String),

    /// An editorial lock is held by someone else; non-fatal, the caller
    /// falls back to read-only behavior.
    #[error("File is locked by {holder}")]
    LockConflict {
        /// Display name of the current holder
        holder: String,
    },

    /// An entry's parent chain cannot be resolved (orphaned or cyclic).
    #[error("Cannot resolve path for remote entry {0}")]
    PathResolutionFailure(String),

    /// A domain-level validation error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl From<GrantError> for SyncError {
    fn from(err: GrantError) -> Self {
        SyncError::GrantInvalidated(err.to_string())
    }
}
