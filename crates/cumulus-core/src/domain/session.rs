//! Sync session and the per-file record ledger
//!
//! A [`SyncSession`] is created when the user selects a local directory and
//! owns the [`SyncLedger`] of per-file [`SyncRecord`]s. The session itself
//! is not persistable as a whole because its [`DirectoryGrant`] is not; the
//! serializable subset lives in [`SessionState`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::grant::DirectoryGrant;
use super::newtypes::{EntryId, RelativePath, VaultPath};

// ============================================================================
// SyncRecord
// ============================================================================

/// Last-known-synchronized state for one remote file.
///
/// Absence of a record for a path means "treat as new". Records are upserted
/// after every successful transfer in either direction and never silently
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Remote store identifier of the file
    pub remote_id: EntryId,
    /// Slash-joined path rooted at the sync root
    pub relative_path: RelativePath,
    /// When the local copy was last reconciled with the remote one
    pub last_local_sync: DateTime<Utc>,
    /// Size in bytes at last sync
    pub size: u64,
}

impl SyncRecord {
    /// Creates a record for a freshly transferred file
    pub fn new(
        remote_id: EntryId,
        relative_path: RelativePath,
        last_local_sync: DateTime<Utc>,
        size: u64,
    ) -> Self {
        Self {
            remote_id,
            relative_path,
            last_local_sync,
            size,
        }
    }
}

// ============================================================================
// SyncLedger
// ============================================================================

/// Concurrent map of [`SyncRecord`]s keyed by relative path.
///
/// The ledger is the only sync state mutated from concurrent per-file
/// transfer tasks, so it lives behind a concurrent map rather than a plain
/// `HashMap` guarded by the pass itself.
#[derive(Debug, Default)]
pub struct SyncLedger {
    records: DashMap<RelativePath, SyncRecord>,
}

impl SyncLedger {
    /// Creates an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the record for a path, if any
    pub fn get(&self, path: &RelativePath) -> Option<SyncRecord> {
        self.records.get(path).map(|r| r.clone())
    }

    /// Look up a record by remote id
    pub fn get_by_remote_id(&self, id: &EntryId) -> Option<SyncRecord> {
        self.records
            .iter()
            .find(|r| &r.remote_id == id)
            .map(|r| r.clone())
    }

    /// Insert or replace the record for its path
    pub fn upsert(&self, record: SyncRecord) {
        self.records.insert(record.relative_path.clone(), record);
    }

    /// Remove the record for a path
    pub fn remove(&self, path: &RelativePath) -> Option<SyncRecord> {
        self.records.remove(path).map(|(_, r)| r)
    }

    /// Number of tracked files
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no files are tracked
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of all records (unordered)
    pub fn snapshot(&self) -> Vec<SyncRecord> {
        self.records.iter().map(|r| r.clone()).collect()
    }
}

// ============================================================================
// SyncSession
// ============================================================================

/// One user-selected mirror between a local directory and the remote store.
///
/// Created on explicit directory selection, destroyed by explicit reset.
/// Grant rejection by the OS surfaces as a distinct error at the call sites
/// that touch the filesystem; it never tears the session down implicitly.
#[derive(Debug)]
pub struct SyncSession {
    /// Capability for the local root
    grant: DirectoryGrant,
    /// Display label of the root directory
    root_label: String,
    /// Optional sub-path within the granted directory to mirror
    sub_path: Option<RelativePath>,
    /// Completion time of the last full pass
    last_sync: Option<DateTime<Utc>>,
    /// Whether auto-sync is currently active for this session
    running: bool,
    /// Per-file sync records owned by this session. Shared as an `Arc` so
    /// concurrent transfer tasks can upsert without holding the session.
    ledger: Arc<SyncLedger>,
}

impl SyncSession {
    /// Creates a session for a claimed grant
    pub fn new(grant: DirectoryGrant, sub_path: Option<RelativePath>) -> Self {
        let root_label = grant.label().to_string();
        Self {
            grant,
            root_label,
            sub_path,
            last_sync: None,
            running: false,
            ledger: Arc::new(SyncLedger::new()),
        }
    }

    /// The capability for the local root
    pub fn grant(&self) -> &DirectoryGrant {
        &self.grant
    }

    /// Display label of the granted root
    pub fn root_label(&self) -> &str {
        &self.root_label
    }

    /// Optional sub-path being mirrored
    pub fn sub_path(&self) -> Option<&RelativePath> {
        self.sub_path.as_ref()
    }

    /// The directory actually mirrored: the grant root, or the sub-path
    /// within it when one is configured.
    pub fn effective_root(&self) -> VaultPath {
        match &self.sub_path {
            Some(sub) => self.grant.root().join(sub),
            None => self.grant.root().clone(),
        }
    }

    /// Completion time of the last full pass, if any
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    /// Record the completion of a full pass
    pub fn record_sync(&mut self, at: DateTime<Utc>) {
        self.last_sync = Some(at);
    }

    /// Whether auto-sync is active
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Flip the auto-sync flag
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// The record ledger owned by this session
    pub fn ledger(&self) -> &SyncLedger {
        &self.ledger
    }

    /// Shared handle to the ledger for concurrent transfer tasks
    pub fn ledger_handle(&self) -> Arc<SyncLedger> {
        Arc::clone(&self.ledger)
    }

    /// Serializable subset of this session for persistence
    pub fn to_state(&self, auto_sync_interval_secs: u64) -> SessionState {
        SessionState {
            root_label: self.root_label.clone(),
            sub_path: self.sub_path.clone(),
            last_sync: self.last_sync,
            auto_sync_interval_secs,
        }
    }
}

// ============================================================================
// SessionState - persisted subset
// ============================================================================

/// The persistable subset of a session.
///
/// The grant is deliberately absent: it cannot survive a restart, and the
/// stored label exists only so the UI can tell the user what to re-select.
/// The schema is implementation-internal but must round-trip exactly
/// (save -> load -> save produces identical values).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Label of the previously selected root directory
    pub root_label: String,
    /// Optional sub-path within the root
    pub sub_path: Option<RelativePath>,
    /// Completion time of the last full pass
    pub last_sync: Option<DateTime<Utc>>,
    /// Configured auto-sync interval in seconds
    pub auto_sync_interval_secs: u64,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_grant(dir: &TempDir) -> DirectoryGrant {
        DirectoryGrant::claim(VaultPath::new(dir.path().to_path_buf()).unwrap()).unwrap()
    }

    fn record(path: &str, id: &str) -> SyncRecord {
        SyncRecord::new(
            EntryId::new(id).unwrap(),
            RelativePath::new(path).unwrap(),
            Utc::now(),
            42,
        )
    }

    // ------------------------------------------------------------------
    // SyncLedger
    // ------------------------------------------------------------------

    #[test]
    fn test_ledger_upsert_and_get() {
        let ledger = SyncLedger::new();
        assert!(ledger.is_empty());

        ledger.upsert(record("a/b.txt", "id-1"));
        assert_eq!(ledger.len(), 1);

        let got = ledger.get(&RelativePath::new("a/b.txt").unwrap()).unwrap();
        assert_eq!(got.remote_id.as_str(), "id-1");
        assert_eq!(got.size, 42);
    }

    #[test]
    fn test_ledger_upsert_replaces() {
        let ledger = SyncLedger::new();
        ledger.upsert(record("a.txt", "id-1"));

        let mut updated = record("a.txt", "id-1");
        updated.size = 99;
        ledger.upsert(updated);

        assert_eq!(ledger.len(), 1);
        let got = ledger.get(&RelativePath::new("a.txt").unwrap()).unwrap();
        assert_eq!(got.size, 99);
    }

    #[test]
    fn test_ledger_missing_path_means_new() {
        let ledger = SyncLedger::new();
        assert!(ledger.get(&RelativePath::new("unseen.txt").unwrap()).is_none());
    }

    #[test]
    fn test_ledger_get_by_remote_id() {
        let ledger = SyncLedger::new();
        ledger.upsert(record("x/y.txt", "id-7"));
        let got = ledger.get_by_remote_id(&EntryId::new("id-7").unwrap()).unwrap();
        assert_eq!(got.relative_path.as_str(), "x/y.txt");
        assert!(ledger.get_by_remote_id(&EntryId::new("id-8").unwrap()).is_none());
    }

    #[test]
    fn test_ledger_remove() {
        let ledger = SyncLedger::new();
        ledger.upsert(record("a.txt", "id-1"));
        let removed = ledger.remove(&RelativePath::new("a.txt").unwrap());
        assert!(removed.is_some());
        assert!(ledger.is_empty());
    }

    // ------------------------------------------------------------------
    // SyncSession
    // ------------------------------------------------------------------

    #[test]
    fn test_session_effective_root_without_sub_path() {
        let dir = TempDir::new().unwrap();
        let session = SyncSession::new(test_grant(&dir), None);
        assert_eq!(session.effective_root().as_path(), dir.path());
    }

    #[test]
    fn test_session_effective_root_with_sub_path() {
        let dir = TempDir::new().unwrap();
        let sub = RelativePath::new("Projects/Current").unwrap();
        let session = SyncSession::new(test_grant(&dir), Some(sub));
        assert_eq!(
            session.effective_root().as_path(),
            dir.path().join("Projects/Current")
        );
    }

    #[test]
    fn test_session_running_flag() {
        let dir = TempDir::new().unwrap();
        let mut session = SyncSession::new(test_grant(&dir), None);
        assert!(!session.is_running());
        session.set_running(true);
        assert!(session.is_running());
    }

    // ------------------------------------------------------------------
    // SessionState round-trip
    // ------------------------------------------------------------------

    #[test]
    fn test_session_state_json_round_trip() {
        let state = SessionState {
            root_label: "Sync".to_string(),
            sub_path: Some(RelativePath::new("work/docs").unwrap()),
            last_sync: Some(Utc::now()),
            auto_sync_interval_secs: 30,
        };

        let json = serde_json::to_string(&state).unwrap();
        let loaded: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, loaded);

        // save -> load -> save must be byte-identical
        let json2 = serde_json::to_string(&loaded).unwrap();
        assert_eq!(json, json2);
    }

    #[test]
    fn test_session_to_state_omits_grant() {
        let dir = TempDir::new().unwrap();
        let mut session = SyncSession::new(test_grant(&dir), None);
        session.record_sync(Utc::now());

        let state = session.to_state(60);
        assert_eq!(state.root_label, session.root_label());
        assert_eq!(state.auto_sync_interval_secs, 60);
        assert!(state.last_sync.is_some());
        // the serialized form carries no filesystem path
        let json = serde_json::to_string(&state).unwrap();
        assert!(!json.contains(dir.path().to_str().unwrap()));
    }
}
