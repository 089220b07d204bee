//! JSON session-state store
//!
//! Persists [`SessionState`] as a small JSON file between process runs.
//! The directory grant is deliberately not part of the state; after a
//! restart the stored label tells the user which directory to re-select.
//!
//! Writes go through a staging sibling plus rename, matching the vault's
//! atomic-write discipline, so a crash never leaves a torn state file.

use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Context;
use tracing::debug;

use cumulus_core::domain::session::SessionState;
use cumulus_core::ports::session_store::SessionStore;

/// File-backed session store.
pub struct JsonSessionStore {
    path: PathBuf,
}

impl JsonSessionStore {
    /// Creates a store over the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Platform-appropriate default location,
    /// typically `~/.local/share/cumulus/session.json` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("cumulus")
            .join("session.json")
    }

    /// The backing file path.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl SessionStore for JsonSessionStore {
    async fn save(&self, state: &SessionState) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create session store directory")?;
        }

        let json = serde_json::to_vec_pretty(state).context("Failed to serialize session state")?;

        let mut staged = self.path.as_os_str().to_owned();
        staged.push(".tmp");
        let staged = PathBuf::from(staged);

        tokio::fs::write(&staged, &json)
            .await
            .context("Failed to write staged session state")?;
        tokio::fs::rename(&staged, &self.path)
            .await
            .context("Failed to promote session state")?;

        debug!(path = %self.path.display(), "session state saved");
        Ok(())
    }

    async fn load(&self) -> anyhow::Result<Option<SessionState>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read session state"),
        };
        let state: SessionState =
            serde_json::from_slice(&bytes).context("Failed to parse session state")?;
        Ok(Some(state))
    }

    async fn clear(&self) -> anyhow::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to clear session state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use cumulus_core::domain::newtypes::RelativePath;

    use super::*;

    fn sample_state() -> SessionState {
        SessionState {
            root_label: "Cumulus".to_string(),
            sub_path: Some(RelativePath::new("work/docs").unwrap()),
            last_sync: Some(Utc::now()),
            auto_sync_interval_secs: 30,
        }
    }

    #[tokio::test]
    async fn test_save_load_save_round_trips_identically() {
        let dir = TempDir::new().unwrap();
        let store = JsonSessionStore::new(dir.path().join("session.json"));
        let state = sample_state();

        store.save(&state).await.unwrap();
        let first_bytes = std::fs::read(store.path()).unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, state);

        store.save(&loaded).await.unwrap();
        let second_bytes = std::fs::read(store.path()).unwrap();
        assert_eq!(first_bytes, second_bytes);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonSessionStore::new(dir.path().join("absent.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = JsonSessionStore::new(dir.path().join("nested/deep/session.json"));
        store.save(&sample_state()).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_save_leaves_no_staging_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonSessionStore::new(dir.path().join("session.json"));
        store.save(&sample_state()).await.unwrap();
        assert!(!dir.path().join("session.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_clear_then_load_is_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonSessionStore::new(dir.path().join("session.json"));
        store.save(&sample_state()).await.unwrap();

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        // Clearing twice is fine.
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_state_is_an_error_not_a_crash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = JsonSessionStore::new(path);
        assert!(store.load().await.is_err());
    }
}
