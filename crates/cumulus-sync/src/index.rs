//! Remote directory index
//!
//! Read model over one `list_entries` snapshot. The index answers the two
//! questions the engine keeps asking:
//!
//! 1. What is the full path of entry X? (walk `parent_id` links bottom-up)
//! 2. Does folder/file named N already exist under parent P?
//!
//! Path resolution detects orphaned and cyclic parent chains and reports
//! them as [`SyncError::PathResolutionFailure`] so a single broken entry
//! never aborts a pass.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use cumulus_core::domain::newtypes::RelativePath;
use cumulus_core::ports::remote_store::{Entry, EntryKind};

use crate::SyncError;

/// In-memory read model of the remote hierarchy.
#[derive(Debug, Default)]
pub struct RemoteIndex {
    /// All listed entries keyed by id
    entries: HashMap<String, Entry>,
    /// Child ids grouped by parent id (None = store root)
    children: HashMap<Option<String>, Vec<String>>,
}

impl RemoteIndex {
    /// Builds the index from a listing snapshot.
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut index = Self::default();
        for entry in entries {
            index.insert(entry);
        }
        debug!(entries = index.entries.len(), "remote index built");
        index
    }

    /// Adds an entry created mid-pass (folder creation, upload) so later
    /// lookups within the same pass see it.
    pub fn insert(&mut self, entry: Entry) {
        self.children
            .entry(entry.parent_id.clone())
            .or_default()
            .push(entry.id.clone());
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Looks up an entry by id
    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.get(id)
    }

    /// Number of indexed entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All non-deleted files
    pub fn live_files(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values().filter(|e| e.is_live_file())
    }

    /// Finds a live folder named `name` under `parent` (None = store root)
    pub fn find_child_folder(&self, parent: Option<&str>, name: &str) -> Option<&Entry> {
        self.find_child(parent, name, EntryKind::Folder)
    }

    /// Finds a live file named `name` under `parent` (None = store root)
    pub fn find_child_file(&self, parent: Option<&str>, name: &str) -> Option<&Entry> {
        self.find_child(parent, name, EntryKind::File)
    }

    fn find_child(&self, parent: Option<&str>, name: &str, kind: EntryKind) -> Option<&Entry> {
        let key = parent.map(str::to_string);
        self.children.get(&key)?.iter().find_map(|id| {
            self.entries
                .get(id)
                .filter(|e| e.kind == kind && !e.deleted && e.name == name)
        })
    }

    /// Resolves the full path of an entry by walking its parent chain.
    ///
    /// Folder names are collected bottom-up and joined shallowest-first.
    ///
    /// # Errors
    /// [`SyncError::PathResolutionFailure`] when a parent id is missing from
    /// the index (orphan) or the chain loops (cycle), or when a name cannot
    /// form a valid relative path.
    pub fn resolve_path(&self, id: &str) -> Result<RelativePath, SyncError> {
        let mut segments: Vec<&str> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();

        let mut current = self
            .entries
            .get(id)
            .ok_or_else(|| SyncError::PathResolutionFailure(id.to_string()))?;

        loop {
            if !visited.insert(current.id.as_str()) {
                debug!(id, at = %current.id, "cycle in parent chain");
                return Err(SyncError::PathResolutionFailure(id.to_string()));
            }
            segments.push(current.name.as_str());

            match &current.parent_id {
                None => break,
                Some(parent_id) => {
                    current = self.entries.get(parent_id).ok_or_else(|| {
                        debug!(id, parent = %parent_id, "orphaned parent chain");
                        SyncError::PathResolutionFailure(id.to_string())
                    })?;
                }
            }
        }

        segments.reverse();
        RelativePath::from_segments(segments)
            .map_err(|_| SyncError::PathResolutionFailure(id.to_string()))
    }

    /// Depth of an entry below the store root (root-level entries have 1).
    ///
    /// # Errors
    /// Same failure modes as [`resolve_path`](Self::resolve_path).
    pub fn depth(&self, id: &str) -> Result<usize, SyncError> {
        Ok(self.resolve_path(id)?.depth())
    }
}
