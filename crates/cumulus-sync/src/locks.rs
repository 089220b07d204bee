//! Lock manager - cooperative per-file mutual exclusion for edit sessions
//!
//! The [`LockManager`] arbitrates "open for edit" access to remote files.
//! A lock is a soft editorial claim: the remote store is asked first (so
//! other clients see the lock), and a local table enforces mutual exclusion
//! within this process. Expired locks are treated as absent on the next
//! acquire; nothing hard-enforces expiry against a holder mid-edit.
//!
//! The manager also tracks the set of files currently open in an external
//! editor. Each open file gets a watch loop that keeps its lock fresh;
//! closing the file stops the loop and releases the lock.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cumulus_core::domain::lock::LockRecord;
use cumulus_core::domain::newtypes::{EntryId, HolderId};
use cumulus_core::ports::remote_store::RemoteStore;

use crate::SyncError;

/// A file currently open in an external editor.
struct OpenFile {
    token: CancellationToken,
    watcher: JoinHandle<()>,
}

/// Cooperative per-file lock arbitration.
///
/// The lock table is independent of the reconciler's state: locking answers
/// "may I edit", mirroring answers "are bytes identical", and a running
/// pass never touches this table.
pub struct LockManager {
    remote: Arc<dyn RemoteStore>,
    /// Live lock records, at most one per file id
    table: Arc<DashMap<EntryId, LockRecord>>,
    /// Files currently open for edit, with their watch loops
    open: Arc<DashMap<EntryId, OpenFile>>,
    /// Inactivity timeout after which a lock is treated as absent
    ttl: Duration,
}

impl LockManager {
    /// Creates a manager with the given lock expiry.
    pub fn new(remote: Arc<dyn RemoteStore>, ttl: Duration) -> Self {
        Self {
            remote,
            table: Arc::new(DashMap::new()),
            open: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Attempts to take the editorial lock on a file.
    ///
    /// Idempotent for the same holder (the record is refreshed). Returns
    /// `Ok(false)` - non-fatal - when another holder has an unexpired lock,
    /// locally or remotely.
    ///
    /// # Errors
    /// [`SyncError::RemoteUnavailable`] when the remote lock call itself
    /// fails (as opposed to being refused).
    pub async fn acquire(
        &self,
        file_id: &EntryId,
        holder: &HolderId,
        holder_name: &str,
    ) -> Result<bool, SyncError> {
        // Fast local check; an expired record is treated as absent.
        if let Some(mut existing) = self.table.get_mut(file_id) {
            if !existing.is_expired(self.ttl) {
                if existing.is_held_by(holder) {
                    existing.refresh(Utc::now());
                    debug!(file = %file_id, holder = %holder, "lock refreshed");
                    return Ok(true);
                }
                debug!(
                    file = %file_id,
                    held_by = existing.holder_name(),
                    "lock refused: held by another holder"
                );
                return Ok(false);
            }
            debug!(file = %file_id, "expired lock treated as absent");
        }

        let granted = self
            .remote
            .lock(file_id.as_str())
            .await
            .map_err(|e| SyncError::RemoteUnavailable(format!("{e:#}")))?;
        if !granted {
            debug!(file = %file_id, "lock refused by remote store");
            return Ok(false);
        }

        // Re-check under the shard lock: a concurrent local acquire may
        // have won while we were talking to the remote store.
        let record = LockRecord::new(file_id.clone(), *holder, holder_name);
        let lost_race = match self.table.entry(file_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                if current.is_expired(self.ttl) || current.is_held_by(holder) {
                    occupied.insert(record);
                    false
                } else {
                    true
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(record);
                false
            }
        };

        if lost_race {
            // Hand the remote lock back; the local winner already holds it.
            if let Err(e) = self.remote.unlock(file_id.as_str()).await {
                warn!(file = %file_id, error = format!("{e:#}"), "failed to return remote lock");
            }
            return Ok(false);
        }

        info!(file = %file_id, holder = %holder, "lock acquired");
        Ok(true)
    }

    /// Releases the lock on a file unconditionally.
    ///
    /// Release-by-anyone is acceptable: this is a soft editorial lock, not
    /// a security boundary. The remote unlock is best-effort; the local
    /// record is gone either way.
    pub async fn release(&self, file_id: &EntryId) {
        self.table.remove(file_id);
        if let Err(e) = self.remote.unlock(file_id.as_str()).await {
            warn!(
                file = %file_id,
                error = format!("{e:#}"),
                "remote unlock failed; local record already cleared"
            );
        }
        info!(file = %file_id, "lock released");
    }

    /// Current holder display name of an unexpired lock, if any.
    pub fn holder_of(&self, file_id: &EntryId) -> Option<String> {
        self.table.get(file_id).and_then(|record| {
            if record.is_expired(self.ttl) {
                None
            } else {
                Some(record.holder_name().to_string())
            }
        })
    }

    /// Number of files currently open for edit.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Marks a file as open in an external editor.
    ///
    /// Acquires the lock and starts a watch loop that keeps the record
    /// fresh while the file remains open.
    ///
    /// # Errors
    /// - [`SyncError::LockConflict`] when another holder has the lock; the
    ///   caller falls back to read-only behavior
    /// - [`SyncError::RemoteUnavailable`] when the lock call itself fails
    pub async fn mark_open(
        &self,
        file_id: &EntryId,
        holder: &HolderId,
        holder_name: &str,
    ) -> Result<(), SyncError> {
        if self.open.contains_key(file_id) {
            debug!(file = %file_id, "file already open, refreshing lock");
            self.acquire(file_id, holder, holder_name).await?;
            return Ok(());
        }

        if !self.acquire(file_id, holder, holder_name).await? {
            let holder = self
                .holder_of(file_id)
                .unwrap_or_else(|| "another client".to_string());
            return Err(SyncError::LockConflict { holder });
        }

        let token = CancellationToken::new();
        let watcher = tokio::spawn(watch_open_file(
            file_id.clone(),
            Arc::clone(&self.table),
            Arc::clone(&self.open),
            Arc::clone(&self.remote),
            self.refresh_interval(),
            token.clone(),
        ));
        self.open.insert(file_id.clone(), OpenFile { token, watcher });
        info!(file = %file_id, "edit session opened");
        Ok(())
    }

    /// Marks a file as no longer open.
    ///
    /// Stops its watch loop and releases the lock; waits until both have
    /// happened.
    pub async fn mark_closed(&self, file_id: &EntryId) {
        let Some((_, open_file)) = self.open.remove(file_id) else {
            return;
        };
        open_file.token.cancel();
        let _ = open_file.watcher.await;
        info!(file = %file_id, "edit session closed");
    }

    fn refresh_interval(&self) -> StdDuration {
        let ms = (self.ttl.num_milliseconds().max(3) / 3) as u64;
        StdDuration::from_millis(ms)
    }
}

/// Keeps the lock on an open file fresh; releases it when the file leaves
/// the open set or the loop is cancelled.
async fn watch_open_file(
    file_id: EntryId,
    table: Arc<DashMap<EntryId, LockRecord>>,
    open: Arc<DashMap<EntryId, OpenFile>>,
    remote: Arc<dyn RemoteStore>,
    refresh: StdDuration,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(refresh) => {
                if !open.contains_key(&file_id) {
                    debug!(file = %file_id, "file left the open set, stopping watch");
                    break;
                }
                if let Some(mut record) = table.get_mut(&file_id) {
                    record.refresh(Utc::now());
                    debug!(file = %file_id, "lock kept fresh");
                }
            }
        }
    }

    table.remove(&file_id);
    if let Err(e) = remote.unlock(file_id.as_str()).await {
        warn!(file = %file_id, error = format!("{e:#}"), "remote unlock failed on close");
    }
    debug!(file = %file_id, "watch loop released lock");
}

// ============================================================================
// Tests
// ============================================================================
