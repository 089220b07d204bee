//! Reconciliation engine
//!
//! The [`SyncEngine`] keeps the granted local directory and the remote store
//! consistent in both directions.
//!
//! ## Pass flow
//!
//! 1. **Push** (scan): walk the local tree, upload files that are new or
//!    newer than their sync record (clock-skew tolerant), creating remote
//!    folder chains parent-before-child.
//! 2. **Pull** (mirror): select remote files (all live ones, or an explicit
//!    scope), resolve their paths bottom-up, create local folder chains
//!    top-down, then download through staged atomic writes.
//!
//! Push runs before pull so locally authored changes are not overwritten by
//! a stale pull. Only one pass exists per session at any time: the in-flight
//! flag is a mutually exclusive gate, not a queue, and a rejected caller
//! gets [`SyncError::ConcurrentSyncInProgress`] immediately.
//!
//! Per-file problems never abort a pass; they are collected into
//! [`PassOutcome::failures`] and reconciliation continues.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cumulus_core::config::Config;
use cumulus_core::domain::newtypes::{EntryId, RelativePath, VaultPath};
use cumulus_core::domain::outcome::PassOutcome;
use cumulus_core::domain::session::{SyncLedger, SyncRecord, SyncSession};
use cumulus_core::ports::local_vault::{LocalEntry, LocalVault};
use cumulus_core::ports::remote_store::{Entry, RemoteStore};

use crate::index::RemoteIndex;
use crate::SyncError;

// ============================================================================
// PassScope
// ============================================================================

/// What a reconciliation pass should cover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PassScope {
    /// Push local changes, then pull everything (the periodic/manual pass)
    #[default]
    Full,
    /// Pull every live remote file (folder-affecting event)
    PullAll,
    /// Pull exactly these remote files (debounced file events)
    PullFiles(Vec<EntryId>),
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Resets the in-flight flag even when a pass unwinds early.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Bidirectional reconciliation engine for one sync session.
pub struct SyncEngine {
    /// Remote file store operations
    remote: Arc<dyn RemoteStore>,
    /// Local filesystem operations under the granted root
    vault: Arc<dyn LocalVault>,
    /// The session being reconciled
    session: Arc<Mutex<SyncSession>>,
    /// Shared handle to the session's record ledger
    ledger: Arc<SyncLedger>,
    /// Tolerance when comparing a local mtime to a record timestamp
    skew: ChronoDuration,
    /// Bound on concurrent per-file transfers within one pass
    transfer_concurrency: usize,
    /// Per-file transfer timeout
    transfer_timeout: Duration,
    /// Caller-supplied cancellation for in-flight transfers
    cancel: CancellationToken,
    /// The single-flight gate: true while a pass is running
    in_flight: AtomicBool,
}

impl SyncEngine {
    /// Creates an engine for a session.
    ///
    /// # Arguments
    /// * `remote` - remote store adapter
    /// * `vault` - local filesystem adapter
    /// * `session` - the session to reconcile, consumed and shared
    /// * `config` - sync tunables (skew tolerance, concurrency, timeout)
    /// * `cancel` - cancels in-flight transfers on shutdown
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        vault: Arc<dyn LocalVault>,
        session: SyncSession,
        config: &Config,
        cancel: CancellationToken,
    ) -> Self {
        let ledger = session.ledger_handle();
        Self {
            remote,
            vault,
            session: Arc::new(Mutex::new(session)),
            ledger,
            skew: ChronoDuration::milliseconds(config.sync.skew_tolerance_ms as i64),
            transfer_concurrency: config.sync.transfer_concurrency.max(1) as usize,
            transfer_timeout: Duration::from_secs(config.sync.transfer_timeout_secs),
            cancel,
            in_flight: AtomicBool::new(false),
        }
    }

    /// The shared session handle
    pub fn session(&self) -> &Arc<Mutex<SyncSession>> {
        &self.session
    }

    /// The shared record ledger
    pub fn ledger(&self) -> &Arc<SyncLedger> {
        &self.ledger
    }

    /// Whether a pass is currently running
    pub fn is_pass_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs one reconciliation pass.
    ///
    /// # Errors
    /// - [`SyncError::ConcurrentSyncInProgress`] when a pass is already
    ///   running for this session (rejected immediately, never queued)
    /// - [`SyncError::GrantInvalidated`] when the local grant is unusable
    /// - [`SyncError::RemoteUnavailable`] when the directory listing itself
    ///   cannot be fetched (per-file failures are reported in the outcome)
    #[tracing::instrument(skip(self))]
    pub async fn run_pass(&self, scope: PassScope) -> Result<PassOutcome, SyncError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("pass rejected: another pass is in flight");
            return Err(SyncError::ConcurrentSyncInProgress);
        }
        let _guard = InFlightGuard(&self.in_flight);
        let started = std::time::Instant::now();

        let root = {
            let session = self.session.lock().await;
            session.grant().verify()?;
            session.effective_root()
        };

        let listing = self
            .remote
            .list_entries()
            .await
            .map_err(|e| SyncError::RemoteUnavailable(format!("{e:#}")))?;
        let mut index = RemoteIndex::from_entries(listing);

        let mut outcome = PassOutcome::new();
        match &scope {
            PassScope::Full => {
                self.push_pass(&mut index, &root, &mut outcome).await;
                self.pull_pass(&index, &root, None, &mut outcome).await;
                self.session.lock().await.record_sync(Utc::now());
            }
            PassScope::PullAll => {
                self.pull_pass(&index, &root, None, &mut outcome).await;
            }
            PassScope::PullFiles(ids) => {
                self.pull_pass(&index, &root, Some(ids.as_slice()), &mut outcome)
                    .await;
            }
        }

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            scanned = outcome.scanned,
            pushed = outcome.pushed,
            pulled = outcome.pulled,
            folders_created = outcome.folders_created,
            failures = outcome.failures.len(),
            duration_ms = outcome.duration_ms,
            "pass completed"
        );
        Ok(outcome)
    }

    // ========================================================================
    // Push (change scanner)
    // ========================================================================

    async fn push_pass(
        &self,
        index: &mut RemoteIndex,
        root: &VaultPath,
        outcome: &mut PassOutcome,
    ) {
        let entries = match self.vault.walk(root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = format!("{e:#}"), "local scan failed");
                outcome.record_failure(".", format!("local scan failed: {e:#}"));
                return;
            }
        };
        outcome.scanned = entries.len() as u32;

        let candidates: Vec<LocalEntry> = entries
            .into_iter()
            .filter(|entry| match self.ledger.get(&entry.path) {
                None => true,
                Some(record) => entry.modified > record.last_local_sync + self.skew,
            })
            .collect();

        if candidates.is_empty() {
            debug!("no local changes to push");
            return;
        }
        info!(count = candidates.len(), "local changes need push");

        // Resolve or create the remote folder chain for every candidate,
        // shallowest first so parents always exist before their children.
        let mut ancestors: Vec<RelativePath> = candidates
            .iter()
            .flat_map(|c| c.path.ancestors())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        ancestors.sort_by_key(RelativePath::depth);

        let mut folder_ids: HashMap<RelativePath, String> = HashMap::new();
        let mut broken: HashSet<RelativePath> = HashSet::new();

        for folder in ancestors {
            if let Some(parent) = folder.parent() {
                if broken.contains(&parent) {
                    broken.insert(folder);
                    continue;
                }
            }
            let parent_id = folder.parent().and_then(|p| folder_ids.get(&p).cloned());
            let name = folder.file_name().to_string();

            if let Some(existing) = index.find_child_folder(parent_id.as_deref(), &name) {
                folder_ids.insert(folder, existing.id.clone());
                continue;
            }

            match self.remote.create_folder(&name, parent_id.as_deref()).await {
                Ok(created) => {
                    debug!(folder = %folder, id = %created.id, "remote folder created");
                    folder_ids.insert(folder, created.id.clone());
                    index.insert(created);
                    outcome.folders_created += 1;
                }
                Err(e) => {
                    warn!(folder = %folder, error = format!("{e:#}"), "remote folder creation failed");
                    outcome.record_failure(folder.as_str(), format!("folder creation failed: {e:#}"));
                    broken.insert(folder);
                }
            }
        }

        // Folder chains are settled; transfer files with bounded parallelism.
        let semaphore = Arc::new(Semaphore::new(self.transfer_concurrency));
        let mut tasks: JoinSet<(RelativePath, anyhow::Result<()>)> = JoinSet::new();

        for candidate in candidates {
            let parent = candidate.path.parent();
            if let Some(parent) = &parent {
                if broken.contains(parent) {
                    outcome.record_failure(
                        candidate.path.as_str(),
                        "parent folder could not be created",
                    );
                    continue;
                }
            }
            let parent_id = parent.and_then(|p| folder_ids.get(&p).cloned());
            let existing_id = index
                .find_child_file(parent_id.as_deref(), candidate.path.file_name())
                .map(|e| e.id.clone());

            let remote = Arc::clone(&self.remote);
            let vault = Arc::clone(&self.vault);
            let ledger = Arc::clone(&self.ledger);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let timeout = self.transfer_timeout;
            let abs = root.join(&candidate.path);

            tasks.spawn(async move {
                let permit = semaphore.acquire_owned().await;
                if permit.is_err() {
                    return (candidate.path, Err(anyhow!("transfer pool closed")));
                }
                let path = candidate.path.clone();
                let result = push_one(
                    remote,
                    vault,
                    ledger,
                    candidate,
                    parent_id,
                    existing_id,
                    abs,
                    cancel,
                    timeout,
                )
                .await;
                (path, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => outcome.pushed += 1,
                Ok((path, Err(e))) => {
                    warn!(path = %path, error = format!("{e:#}"), "push failed");
                    outcome.record_failure(path.as_str(), format!("{e:#}"));
                }
                Err(e) => {
                    warn!(error = %e, "push task aborted");
                    outcome.record_failure(".", format!("push task aborted: {e}"));
                }
            }
        }
    }

    // ========================================================================
    // Pull (mirror writer)
    // ========================================================================

    async fn pull_pass(
        &self,
        index: &RemoteIndex,
        root: &VaultPath,
        only: Option<&[EntryId]>,
        outcome: &mut PassOutcome,
    ) {
        // Select targets: an explicit scope, or every live remote file.
        let targets: Vec<&Entry> = match only {
            Some(ids) => ids
                .iter()
                .filter_map(|id| match index.get(id.as_str()) {
                    Some(entry) if entry.is_live_file() => Some(entry),
                    Some(_) => {
                        debug!(id = %id, "scoped target is not a live file, skipping");
                        None
                    }
                    None => {
                        outcome.record_failure(id.as_str(), "unknown remote entry");
                        None
                    }
                })
                .collect(),
            None => index.live_files().collect(),
        };

        // Resolve paths bottom-up; a broken parent chain skips that file only.
        let mut resolved: Vec<(Entry, RelativePath)> = Vec::with_capacity(targets.len());
        for entry in targets {
            match index.resolve_path(&entry.id) {
                Ok(path) => resolved.push((entry.clone(), path)),
                Err(e) => {
                    warn!(id = %entry.id, error = %e, "path resolution failed");
                    outcome.record_failure(&entry.id, e.to_string());
                }
            }
        }

        // Drop files whose local copy already reflects the remote state.
        let mut work: Vec<(Entry, RelativePath, VaultPath)> = Vec::new();
        for (entry, path) in resolved {
            let dest = root.join(&path);
            let local = match self.vault.state(&dest).await {
                Ok(state) => state,
                Err(e) => {
                    outcome.record_failure(path.as_str(), format!("stat failed: {e:#}"));
                    continue;
                }
            };
            if local.is_regular_file() {
                if let Some(record) = self.ledger.get(&path) {
                    let unchanged = match entry.modified {
                        Some(modified) => modified <= record.last_local_sync + self.skew,
                        None => entry.size == Some(record.size),
                    };
                    if unchanged {
                        debug!(path = %path, "remote file already mirrored, skipping");
                        continue;
                    }
                }
            }
            work.push((entry, path, dest));
        }

        if work.is_empty() {
            debug!("nothing to pull");
            return;
        }
        info!(count = work.len(), "remote files need pull");

        // Create local folder chains top-down before any file transfers.
        let mut dirs: Vec<RelativePath> = work
            .iter()
            .filter_map(|(_, path, _)| path.parent())
            .flat_map(|parent| {
                let mut chain = parent.ancestors();
                chain.push(parent);
                chain
            })
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        dirs.sort_by_key(RelativePath::depth);

        for dir in dirs {
            let abs = root.join(&dir);
            match self.vault.state(&abs).await {
                Ok(state) if state.is_directory() => {}
                _ => match self.vault.create_dir_chain(&abs).await {
                    Ok(()) => outcome.folders_created += 1,
                    Err(e) => {
                        warn!(dir = %dir, error = format!("{e:#}"), "local folder creation failed");
                        outcome.record_failure(dir.as_str(), format!("mkdir failed: {e:#}"));
                    }
                },
            }
        }

        // Bounded-parallel downloads through staged atomic writes.
        let semaphore = Arc::new(Semaphore::new(self.transfer_concurrency));
        let mut tasks: JoinSet<(RelativePath, anyhow::Result<()>)> = JoinSet::new();

        for (entry, path, dest) in work {
            let remote = Arc::clone(&self.remote);
            let vault = Arc::clone(&self.vault);
            let ledger = Arc::clone(&self.ledger);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let timeout = self.transfer_timeout;

            tasks.spawn(async move {
                let permit = semaphore.acquire_owned().await;
                if permit.is_err() {
                    return (path, Err(anyhow!("transfer pool closed")));
                }
                let result =
                    pull_one(remote, vault, ledger, entry, path.clone(), dest, cancel, timeout)
                        .await;
                (path, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => outcome.pulled += 1,
                Ok((path, Err(e))) => {
                    warn!(path = %path, error = format!("{e:#}"), "pull failed");
                    outcome.record_failure(path.as_str(), format!("{e:#}"));
                }
                Err(e) => {
                    warn!(error = %e, "pull task aborted");
                    outcome.record_failure(".", format!("pull task aborted: {e}"));
                }
            }
        }
    }
}

// ============================================================================
// Per-file transfer operations
// ============================================================================

/// Uploads one local file and records the transfer in the ledger.
#[allow(clippy::too_many_arguments)]
async fn push_one(
    remote: Arc<dyn RemoteStore>,
    vault: Arc<dyn LocalVault>,
    ledger: Arc<SyncLedger>,
    entry: LocalEntry,
    parent_id: Option<String>,
    existing_id: Option<String>,
    abs: VaultPath,
    cancel: CancellationToken,
    timeout: Duration,
) -> anyhow::Result<()> {
    let transfer = async {
        let data = vault.read_file(&abs).await.context("read local file")?;

        let remote_id = match existing_id {
            Some(id) => {
                remote
                    .update_file_content(&id, &data)
                    .await
                    .context("update remote content")?;
                id
            }
            None => {
                let created = remote
                    .upload_file(entry.path.file_name(), parent_id.as_deref(), &data)
                    .await
                    .context("upload new file")?;
                created.id
            }
        };

        // The record carries the local mtime so an unchanged file is not
        // pushed again on the next pass.
        ledger.upsert(SyncRecord::new(
            EntryId::new(remote_id)?,
            entry.path.clone(),
            entry.modified,
            data.len() as u64,
        ));
        Ok(())
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(anyhow!("transfer cancelled")),
        result = tokio::time::timeout(timeout, transfer) => match result {
            Ok(inner) => inner,
            Err(_) => Err(anyhow!("transfer timed out after {timeout:?}")),
        },
    }
}

/// Downloads one remote file through a staged write and records the
/// transfer in the ledger.
#[allow(clippy::too_many_arguments)]
async fn pull_one(
    remote: Arc<dyn RemoteStore>,
    vault: Arc<dyn LocalVault>,
    ledger: Arc<SyncLedger>,
    entry: Entry,
    path: RelativePath,
    dest: VaultPath,
    cancel: CancellationToken,
    timeout: Duration,
) -> anyhow::Result<()> {
    let staged = vault.stage_path(&dest);

    let transfer = async {
        let written = remote
            .download_entry_to(&entry.id, &staged)
            .await
            .context("download remote content")?;
        vault
            .promote(&staged, &dest)
            .await
            .context("promote staged file")?;

        ledger.upsert(SyncRecord::new(
            EntryId::new(entry.id.clone())?,
            path.clone(),
            Utc::now(),
            written,
        ));
        Ok(())
    };

    let result = tokio::select! {
        _ = cancel.cancelled() => Err(anyhow!("transfer cancelled")),
        result = tokio::time::timeout(timeout, transfer) => match result {
            Ok(inner) => inner,
            Err(_) => Err(anyhow!("transfer timed out after {timeout:?}")),
        },
    };

    if result.is_err() {
        let _ = vault.discard(&staged).await;
    }
    result
}

// ============================================================================
// Tests
// ============================================================================
