//! Remote store port (driven/secondary port)
//!
//! This module defines the interface to the remote hierarchical file store.
//! The backend is an external collaborator; this trait captures exactly the
//! operations the engine consumes, in provider-agnostic terms.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific and don't need domain-level classification.
//! - [`Entry`] is a port-level DTO with plain-`String` ids; the engine maps
//!   ids into validated domain newtypes where it needs them.
//! - `lock`/`unlock` model the backend's cooperative editorial lock; a
//!   refused `lock` is reported as `Ok(false)`, not as an error.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a remote entry is a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Folder,
}

/// A single row of the remote directory listing.
///
/// `parent_id == None` means the entry sits at the store root. Deleted
/// entries remain listed (trash semantics) with `deleted == true` until
/// permanently removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Provider-assigned identifier
    pub id: String,
    /// Entry name (single path segment)
    pub name: String,
    /// Parent folder id (None for root-level entries)
    pub parent_id: Option<String>,
    /// File or folder
    pub kind: EntryKind,
    /// Last modification timestamp, when the backend reports one
    pub modified: Option<DateTime<Utc>>,
    /// File size in bytes (None for folders)
    pub size: Option<u64>,
    /// Whether the entry currently sits in the trash
    #[serde(default)]
    pub deleted: bool,
}

impl Entry {
    /// True for listed, non-deleted files
    #[must_use]
    pub fn is_live_file(&self) -> bool {
        self.kind == EntryKind::File && !self.deleted
    }

    /// True for listed, non-deleted folders
    #[must_use]
    pub fn is_live_folder(&self) -> bool {
        self.kind == EntryKind::Folder && !self.deleted
    }
}

/// Metadata fields that can be updated on an existing entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPatch {
    /// New name, when renaming
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New parent folder id, when moving
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Port trait for remote file store operations
///
/// Implementations handle transport, serialization, and error mapping.
/// The engine treats every method as fallible and applies its own
/// partial-failure policy on top.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Lists every entry in the store (files and folders, including trash)
    async fn list_entries(&self) -> anyhow::Result<Vec<Entry>>;

    /// Creates a folder under the given parent (None for the store root)
    ///
    /// # Returns
    /// The created folder's entry, including its assigned id
    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> anyhow::Result<Entry>;

    /// Uploads a new file under the given parent
    ///
    /// # Returns
    /// The created file's entry, including its assigned id
    async fn upload_file(
        &self,
        name: &str,
        parent_id: Option<&str>,
        data: &[u8],
    ) -> anyhow::Result<Entry>;

    /// Replaces the content of an existing file
    async fn update_file_content(&self, id: &str, data: &[u8]) -> anyhow::Result<()>;

    /// Updates metadata fields (rename / move) of an existing entry
    async fn update_metadata(&self, id: &str, patch: &MetadataPatch) -> anyhow::Result<()>;

    /// Moves an entry to the trash
    async fn delete_entry(&self, id: &str) -> anyhow::Result<()>;

    /// Restores an entry from the trash
    async fn restore_entry(&self, id: &str) -> anyhow::Result<()>;

    /// Downloads a file's content fully buffered
    async fn download_entry(&self, id: &str) -> anyhow::Result<Vec<u8>>;

    /// Downloads a file's content streamed into `dest`.
    ///
    /// Implementations should write chunk-by-chunk rather than buffering
    /// the whole body; the caller is responsible for atomically promoting
    /// `dest` into its final location afterwards.
    ///
    /// # Returns
    /// The number of bytes written
    async fn download_entry_to(&self, id: &str, dest: &Path) -> anyhow::Result<u64>;

    /// Attempts to take the cooperative editorial lock on a file
    ///
    /// # Returns
    /// `true` when the lock was granted, `false` when another client holds it
    async fn lock(&self, id: &str) -> anyhow::Result<bool>;

    /// Releases the cooperative editorial lock on a file
    async fn unlock(&self, id: &str) -> anyhow::Result<()>;
}
