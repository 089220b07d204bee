//! Local vault port (driven/secondary port)
//!
//! Interface for all interaction with the granted local directory tree:
//! enumeration for the change scanner, staged atomic writes for the mirror
//! writer, and state queries.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - Writes are two-phase: the adapter stages bytes at a sibling path
//!   ([`LocalVault::stage_path`]) and the caller promotes the staged file
//!   with an atomic rename once the content is complete. A partially
//!   written file is never visible under its final name.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::newtypes::{RelativePath, VaultPath};

/// One file found by walking the granted tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    /// Path relative to the walked root
    pub path: RelativePath,
    /// Local modification time
    pub modified: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
}

/// Snapshot of a path's state on the local filesystem
#[derive(Debug, Clone)]
pub struct VaultFileState {
    /// Whether the path exists on disk
    pub exists: bool,
    /// Whether this is a regular file (false for directories)
    pub is_file: bool,
    /// Size in bytes (0 for directories or non-existent paths)
    pub size: u64,
    /// Last modification time (None if not available)
    pub modified: Option<DateTime<Utc>>,
}

impl VaultFileState {
    /// Returns a state representing a non-existent path
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            exists: false,
            is_file: false,
            size: 0,
            modified: None,
        }
    }

    /// Returns true if the path exists and is a regular file
    #[must_use]
    pub fn is_regular_file(&self) -> bool {
        self.exists && self.is_file
    }

    /// Returns true if the path exists and is a directory
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.exists && !self.is_file
    }
}

/// Port trait for local filesystem operations under the sync root
#[async_trait::async_trait]
pub trait LocalVault: Send + Sync {
    /// Recursively enumerates every regular file under `root`.
    ///
    /// Paths in the result are relative to `root`. Entries that cannot be
    /// represented (non-UTF-8 names) are skipped by implementations, not
    /// treated as fatal.
    async fn walk(&self, root: &VaultPath) -> anyhow::Result<Vec<LocalEntry>>;

    /// Reads the entire contents of a file
    async fn read_file(&self, path: &VaultPath) -> anyhow::Result<Vec<u8>>;

    /// Gets the current state of a file or directory.
    ///
    /// Returns [`VaultFileState::not_found`] for missing paths rather than
    /// an error.
    async fn state(&self, path: &VaultPath) -> anyhow::Result<VaultFileState>;

    /// Creates a directory and all parents as needed (`mkdir -p`)
    async fn create_dir_chain(&self, path: &VaultPath) -> anyhow::Result<()>;

    /// The sibling path where content for `dest` is staged before promotion.
    ///
    /// Staged files live in the same directory as their destination so the
    /// promoting rename stays within one filesystem.
    fn stage_path(&self, dest: &VaultPath) -> PathBuf {
        let mut os = dest.as_path().as_os_str().to_owned();
        os.push(".cumulus-part");
        PathBuf::from(os)
    }

    /// Atomically promotes a staged file into its final destination
    async fn promote(&self, staged: &Path, dest: &VaultPath) -> anyhow::Result<()>;

    /// Removes a staged file after a failed transfer
    async fn discard(&self, staged: &Path) -> anyhow::Result<()>;
}
