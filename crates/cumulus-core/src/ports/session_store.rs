//! Session store port (driven/secondary port)
//!
//! Persists the serializable subset of a sync session between process runs.
//! The directory grant is deliberately outside this interface: it cannot be
//! persisted, so a restarted process loads the state and then asks the user
//! to re-select the directory.

use crate::domain::session::SessionState;

/// Port trait for session-state persistence
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Saves the session state, replacing any previous value
    async fn save(&self, state: &SessionState) -> anyhow::Result<()>;

    /// Loads the stored session state, if any
    async fn load(&self) -> anyhow::Result<Option<SessionState>>;

    /// Removes the stored session state (explicit reset)
    async fn clear(&self) -> anyhow::Result<()>;
}
