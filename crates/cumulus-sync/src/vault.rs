//! Local vault adapter (secondary/driven adapter)
//!
//! Implements [`LocalVault`] using `tokio::fs`.
//!
//! ## Design Decisions
//!
//! - **Staged writes**: downloaded content lands at a staging sibling and is
//!   promoted with a rename, so a partially-written file is never visible
//!   under its final name.
//! - **Walk is iterative**: a worklist instead of recursion keeps the future
//!   `Send` without boxing.
//! - **Staging artifacts are invisible**: the walk skips `.cumulus-part`
//!   files so half-finished downloads never look like local changes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use cumulus_core::domain::newtypes::{RelativePath, VaultPath};
use cumulus_core::ports::local_vault::{LocalEntry, LocalVault, VaultFileState};

/// Suffix of staging files; see [`LocalVault::stage_path`].
const STAGE_SUFFIX: &str = ".cumulus-part";

/// Adapter that bridges the [`LocalVault`] port to the real filesystem.
///
/// Zero-sized: all operations derive their context from the path arguments.
#[derive(Debug, Clone, Default)]
pub struct VaultAdapter;

impl VaultAdapter {
    /// Create a new `VaultAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Convert a filesystem timestamp into a `DateTime<Utc>`.
fn to_datetime(time: std::time::SystemTime) -> Option<DateTime<Utc>> {
    time.duration_since(std::time::UNIX_EPOCH)
        .ok()
        .and_then(|dur| DateTime::from_timestamp(dur.as_secs() as i64, dur.subsec_nanos()))
}

#[async_trait::async_trait]
impl LocalVault for VaultAdapter {
    #[instrument(skip(self), fields(root = %root))]
    async fn walk(&self, root: &VaultPath) -> anyhow::Result<Vec<LocalEntry>> {
        let mut out = Vec::new();
        let mut pending: Vec<PathBuf> = vec![root.as_path().to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let metadata = entry.metadata().await?;

                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !metadata.is_file() {
                    continue;
                }

                let Ok(stripped) = path.strip_prefix(root.as_path()) else {
                    continue;
                };
                let Some(joined) = stripped.to_str().map(|s| s.replace('\\', "/")) else {
                    warn!(path = %path.display(), "skipping non-UTF-8 path");
                    continue;
                };
                if joined.ends_with(STAGE_SUFFIX) {
                    continue;
                }
                let relative = match RelativePath::new(joined) {
                    Ok(r) => r,
                    Err(err) => {
                        warn!(path = %path.display(), %err, "skipping unrepresentable path");
                        continue;
                    }
                };

                let modified = metadata
                    .modified()
                    .ok()
                    .and_then(to_datetime)
                    .unwrap_or_else(Utc::now);

                out.push(LocalEntry {
                    path: relative,
                    modified,
                    size: metadata.len(),
                });
            }
        }

        debug!(files = out.len(), "walk complete");
        Ok(out)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn read_file(&self, path: &VaultPath) -> anyhow::Result<Vec<u8>> {
        let data = tokio::fs::read(path.as_path()).await?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn state(&self, path: &VaultPath) -> anyhow::Result<VaultFileState> {
        let metadata = match tokio::fs::metadata(path.as_path()).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(VaultFileState::not_found());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(VaultFileState {
            exists: true,
            is_file: metadata.is_file(),
            size: metadata.len(),
            modified: metadata.modified().ok().and_then(to_datetime),
        })
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn create_dir_chain(&self, path: &VaultPath) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(path.as_path()).await?;
        debug!("directory chain created");
        Ok(())
    }

    fn stage_path(&self, dest: &VaultPath) -> PathBuf {
        let mut os = dest.as_path().as_os_str().to_owned();
        os.push(STAGE_SUFFIX);
        PathBuf::from(os)
    }

    #[instrument(skip(self), fields(staged = %staged.display(), dest = %dest))]
    async fn promote(&self, staged: &Path, dest: &VaultPath) -> anyhow::Result<()> {
        // Same-directory rename, atomic on POSIX filesystems.
        tokio::fs::rename(staged, dest.as_path())
            .await
            .with_context(|| format!("Failed to promote staged file into {dest}"))?;
        debug!("staged file promoted");
        Ok(())
    }

    #[instrument(skip(self), fields(staged = %staged.display()))]
    async fn discard(&self, staged: &Path) -> anyhow::Result<()> {
        match tokio::fs::remove_file(staged).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
