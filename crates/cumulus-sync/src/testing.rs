//! In-memory port fakes shared by the engine, scheduler, channel, and lock
//! manager unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};

use cumulus_core::ports::event_source::{EventBatch, EventSource, WireEvent, WirePayload};
use cumulus_core::ports::remote_store::{Entry, EntryKind, MetadataPatch, RemoteStore};

// ============================================================================
// InMemoryRemote
// ============================================================================

#[derive(Default)]
struct RemoteState {
    entries: HashMap<String, Entry>,
    contents: HashMap<String, Vec<u8>>,
    ops: Vec<String>,
    deny_lock: HashSet<String>,
    fail_uploads: HashSet<String>,
    fail_downloads: HashSet<String>,
    next_id: u32,
}

/// Scriptable in-memory implementation of the [`RemoteStore`] port.
///
/// Records every operation in order so tests can assert sequencing (e.g.
/// parent folders created before uploads).
#[derive(Default)]
pub struct InMemoryRemote {
    state: StdMutex<RemoteState>,
    list_calls: AtomicU32,
    list_delay: StdMutex<Option<Duration>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn seed_folder(&self, id: &str, name: &str, parent: Option<&str>) {
        self.lock_state().entries.insert(
            id.to_string(),
            Entry {
                id: id.to_string(),
                name: name.to_string(),
                parent_id: parent.map(str::to_string),
                kind: EntryKind::Folder,
                modified: None,
                size: None,
                deleted: false,
            },
        );
    }

    pub fn seed_file(
        &self,
        id: &str,
        name: &str,
        parent: Option<&str>,
        content: &[u8],
        modified: DateTime<Utc>,
    ) {
        let mut state = self.lock_state();
        state.entries.insert(
            id.to_string(),
            Entry {
                id: id.to_string(),
                name: name.to_string(),
                parent_id: parent.map(str::to_string),
                kind: EntryKind::File,
                modified: Some(modified),
                size: Some(content.len() as u64),
                deleted: false,
            },
        );
        state.contents.insert(id.to_string(), content.to_vec());
    }

    pub fn fail_download(&self, id: &str) {
        self.lock_state().fail_downloads.insert(id.to_string());
    }

    pub fn fail_upload(&self, name: &str) {
        self.lock_state().fail_uploads.insert(name.to_string());
    }

    pub fn deny_lock(&self, id: &str) {
        self.lock_state().deny_lock.insert(id.to_string());
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self
            .list_delay
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(delay);
    }

    pub fn ops(&self) -> Vec<String> {
        self.lock_state().ops.clone()
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn entry(&self, id: &str) -> Option<Entry> {
        self.lock_state().entries.get(id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Entry> {
        self.lock_state()
            .entries
            .values()
            .find(|e| e.name == name)
            .cloned()
    }

    pub fn content_of(&self, id: &str) -> Option<Vec<u8>> {
        self.lock_state().contents.get(id).cloned()
    }
}

#[async_trait::async_trait]
impl RemoteStore for InMemoryRemote {
    async fn list_entries(&self) -> Result<Vec<Entry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.list_delay.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock_state();
        state.ops.push("list".to_string());
        Ok(state.entries.values().cloned().collect())
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<Entry> {
        let mut state = self.lock_state();
        state.next_id += 1;
        let id = format!("d-gen-{}", state.next_id);
        state.ops.push(format!("create_folder:{name}"));
        let entry = Entry {
            id: id.clone(),
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
            kind: EntryKind::Folder,
            modified: None,
            size: None,
            deleted: false,
        };
        state.entries.insert(id, entry.clone());
        Ok(entry)
    }

    async fn upload_file(
        &self,
        name: &str,
        parent_id: Option<&str>,
        data: &[u8],
    ) -> Result<Entry> {
        let mut state = self.lock_state();
        if state.fail_uploads.contains(name) {
            bail!("simulated upload failure for {name}");
        }
        state.next_id += 1;
        let id = format!("f-gen-{}", state.next_id);
        state.ops.push(format!("upload:{name}"));
        let entry = Entry {
            id: id.clone(),
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
            kind: EntryKind::File,
            modified: Some(Utc::now()),
            size: Some(data.len() as u64),
            deleted: false,
        };
        state.entries.insert(id.clone(), entry.clone());
        state.contents.insert(id, data.to_vec());
        Ok(entry)
    }

    async fn update_file_content(&self, id: &str, data: &[u8]) -> Result<()> {
        let mut state = self.lock_state();
        state.ops.push(format!("update:{id}"));
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| anyhow!("no such entry: {id}"))?;
        entry.size = Some(data.len() as u64);
        entry.modified = Some(Utc::now());
        state.contents.insert(id.to_string(), data.to_vec());
        Ok(())
    }

    async fn update_metadata(&self, id: &str, patch: &MetadataPatch) -> Result<()> {
        let mut state = self.lock_state();
        state.ops.push(format!("patch:{id}"));
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| anyhow!("no such entry: {id}"))?;
        if let Some(name) = &patch.name {
            entry.name = name.clone();
        }
        if let Some(parent) = &patch.parent_id {
            entry.parent_id = Some(parent.clone());
        }
        Ok(())
    }

    async fn delete_entry(&self, id: &str) -> Result<()> {
        let mut state = self.lock_state();
        state.ops.push(format!("delete:{id}"));
        state
            .entries
            .get_mut(id)
            .ok_or_else(|| anyhow!("no such entry: {id}"))?
            .deleted = true;
        Ok(())
    }

    async fn restore_entry(&self, id: &str) -> Result<()> {
        let mut state = self.lock_state();
        state.ops.push(format!("restore:{id}"));
        state
            .entries
            .get_mut(id)
            .ok_or_else(|| anyhow!("no such entry: {id}"))?
            .deleted = false;
        Ok(())
    }

    async fn download_entry(&self, id: &str) -> Result<Vec<u8>> {
        let mut state = self.lock_state();
        state.ops.push(format!("download:{id}"));
        if state.fail_downloads.contains(id) {
            bail!("simulated download failure for {id}");
        }
        state
            .contents
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("no content for entry: {id}"))
    }

    async fn download_entry_to(&self, id: &str, dest: &std::path::Path) -> Result<u64> {
        let content = {
            let mut state = self.lock_state();
            state.ops.push(format!("download_to:{id}"));
            if state.fail_downloads.contains(id) {
                bail!("simulated download failure for {id}");
            }
            state
                .contents
                .get(id)
                .cloned()
                .ok_or_else(|| anyhow!("no content for entry: {id}"))?
        };
        tokio::fs::write(dest, &content).await?;
        Ok(content.len() as u64)
    }

    async fn lock(&self, id: &str) -> Result<bool> {
        let mut state = self.lock_state();
        state.ops.push(format!("lock:{id}"));
        Ok(!state.deny_lock.contains(id))
    }

    async fn unlock(&self, id: &str) -> Result<()> {
        let mut state = self.lock_state();
        state.ops.push(format!("unlock:{id}"));
        Ok(())
    }
}

// ============================================================================
// ScriptedEventSource
// ============================================================================

/// Scripted implementation of the [`EventSource`] port.
///
/// Each `poll_events` call pops the next scripted step. When the script is
/// exhausted, the poll parks forever, which models an idle long-poll under
/// the paused test clock.
#[derive(Default)]
pub struct ScriptedEventSource {
    script: StdMutex<VecDeque<Result<EventBatch, String>>>,
    polls: AtomicU32,
    cursors: StdMutex<Vec<Option<String>>>,
}

impl ScriptedEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, batch: EventBatch) {
        self.script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(Ok(batch));
    }

    pub fn push_err(&self, reason: &str) {
        self.script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(Err(reason.to_string()));
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn cursors(&self) -> Vec<Option<String>> {
        self.cursors
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl EventSource for ScriptedEventSource {
    async fn poll_events(&self, cursor: Option<&str>) -> Result<EventBatch> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.cursors
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(cursor.map(str::to_string));

        let next = self
            .script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();

        match next {
            Some(Ok(batch)) => Ok(batch),
            Some(Err(reason)) => Err(anyhow!(reason)),
            None => {
                // Idle feed: park forever.
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

/// Builds a wire event for a change message.
pub fn wire_event(event_type: &str, id: &str, kind: &str) -> WireEvent {
    WireEvent {
        event_type: event_type.to_string(),
        payload: WirePayload {
            id: Some(id.to_string()),
            kind: Some(kind.to_string()),
        },
        origin_client_id: None,
    }
}

/// Builds a one-event batch with the given cursor.
pub fn batch(events: Vec<WireEvent>, cursor: &str) -> EventBatch {
    EventBatch {
        events,
        cursor: Some(cursor.to_string()),
    }
}
