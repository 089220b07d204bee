//! Sync scheduler - periodic ticks, manual triggers, and debounced
//! incremental passes
//!
//! The [`Scheduler`] owns the three trigger sources that feed the engine's
//! single-flight gate:
//!
//! 1. **Periodic tick** - a fixed-interval full pass; a tick that finds a
//!    pass in flight is skipped, never queued.
//! 2. **Manual trigger** - caller-invoked full pass, same single-flight rule.
//! 3. **Event-triggered incremental** - change events are coalesced in a
//!    [`DebounceTimer`] window; file `created`/`updated` events become one
//!    scoped pull, and any folder-affecting event upgrades the pending work
//!    to a full pull because sibling paths may have changed.
//!
//! `stop()` cancels the tick loop and any pending debounce timer and waits
//! for both to wind down, so no trigger can fire after it returns.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cumulus_core::config::Config;
use cumulus_core::domain::event::ChangeEvent;
use cumulus_core::domain::newtypes::{ClientId, EntryId};
use cumulus_core::domain::outcome::PassOutcome;

use crate::engine::{PassScope, SyncEngine};
use crate::SyncError;

// ============================================================================
// DebounceTimer
// ============================================================================

/// A cancellable one-shot timer.
///
/// Arming replaces any pending timer, which is exactly the coalescing
/// behavior a debounce needs: every new trigger restarts the window, and
/// the action runs once after the window finally elapses undisturbed.
pub(crate) struct DebounceTimer {
    window: Duration,
    handle: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            handle: None,
        }
    }

    /// Arms the timer, cancelling any pending one.
    ///
    /// The action runs after the window elapses unless the timer is
    /// re-armed, cancelled, or `token` is cancelled first.
    pub(crate) fn arm<F, Fut>(&mut self, token: &CancellationToken, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let token = token.child_token();
        let window = self.window;
        self.handle = Some(tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(window) => action().await,
            }
        }));
    }

    /// Cancels any pending timer without firing it.
    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Takes the pending task handle, if any, for the caller to await.
    pub(crate) fn take_handle(&mut self) -> Option<JoinHandle<()>> {
        self.handle.take()
    }
}

// ============================================================================
// Pending scope accumulation
// ============================================================================

/// Work accumulated while the debounce window is open.
#[derive(Debug, Default)]
struct PendingScope {
    files: Vec<EntryId>,
    full: bool,
}

impl PendingScope {
    fn absorb(&mut self, event: &ChangeEvent) {
        if event.is_folder_affecting() {
            self.full = true;
        } else if !self.files.contains(&event.subject_id) {
            self.files.push(event.subject_id.clone());
        }
    }

    fn take(&mut self) -> Option<PassScope> {
        let full = std::mem::take(&mut self.full);
        let files = std::mem::take(&mut self.files);
        if full {
            Some(PassScope::PullAll)
        } else if files.is_empty() {
            None
        } else {
            Some(PassScope::PullFiles(files))
        }
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Drives the engine from timers and change events.
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    /// This client's identity; events it caused are not reacted to
    client_id: ClientId,
    tick_interval: Duration,
    pending: Arc<StdMutex<PendingScope>>,
    debounce: StdMutex<DebounceTimer>,
    token: CancellationToken,
    tick_task: StdMutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Creates a scheduler for the given engine.
    pub fn new(engine: Arc<SyncEngine>, client_id: ClientId, config: &Config) -> Self {
        Self {
            engine,
            client_id,
            tick_interval: Duration::from_secs(config.sync.poll_interval_secs),
            pending: Arc::new(StdMutex::new(PendingScope::default())),
            debounce: StdMutex::new(DebounceTimer::new(Duration::from_millis(
                config.sync.debounce_window_ms,
            ))),
            token: CancellationToken::new(),
            tick_task: StdMutex::new(None),
        }
    }

    /// Starts the periodic tick loop.
    ///
    /// The first full pass runs after one interval, not immediately; an
    /// explicit [`trigger_now`](Self::trigger_now) covers the startup sync.
    pub fn start(&self) {
        let engine = Arc::clone(&self.engine);
        let token = self.token.clone();
        let interval = self.tick_interval;

        info!(interval_secs = interval.as_secs(), "scheduler starting");

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            // Ticks that pile up behind a slow pass are dropped, not queued.
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = timer.tick() => {
                        match engine.run_pass(PassScope::Full).await {
                            Ok(outcome) => {
                                debug!(
                                    pushed = outcome.pushed,
                                    pulled = outcome.pulled,
                                    failures = outcome.failures.len(),
                                    "periodic pass completed"
                                );
                            }
                            Err(SyncError::ConcurrentSyncInProgress) => {
                                debug!("tick skipped: pass already in flight");
                            }
                            Err(SyncError::GrantInvalidated(reason)) => {
                                error!(%reason, "grant invalidated; stopping auto-sync");
                                break;
                            }
                            Err(e) => {
                                warn!(error = %e, "periodic pass failed");
                            }
                        }
                    }
                }
            }
            info!("scheduler tick loop stopped");
        });

        *self
            .tick_task
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(task);
    }

    /// Runs a full pass right now, bypassing the debounce window.
    ///
    /// # Errors
    /// Forwards the engine's errors, including
    /// [`SyncError::ConcurrentSyncInProgress`] - the caller is informed and
    /// may retry later; the request is never queued.
    pub async fn trigger_now(&self) -> Result<PassOutcome, SyncError> {
        info!("manual sync requested");
        self.engine.run_pass(PassScope::Full).await
    }

    /// Feeds one change event into the debounce window.
    ///
    /// Must be called from within a tokio runtime (the debounce timer is a
    /// spawned task).
    pub fn handle_event(&self, event: &ChangeEvent) {
        if event.originated_from(&self.client_id) {
            debug!(id = %event.subject_id, "skipping self-originated event");
            return;
        }

        {
            let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
            pending.absorb(event);
            debug!(
                kind = ?event.kind,
                id = %event.subject_id,
                full = pending.full,
                pending_files = pending.files.len(),
                "change event absorbed"
            );
        }

        let engine = Arc::clone(&self.engine);
        let pending = Arc::clone(&self.pending);
        let mut debounce = self.debounce.lock().unwrap_or_else(|p| p.into_inner());
        debounce.arm(&self.token, move || async move {
            let scope = {
                let mut pending = pending.lock().unwrap_or_else(|p| p.into_inner());
                pending.take()
            };
            let Some(scope) = scope else { return };

            match engine.run_pass(scope).await {
                Ok(outcome) => {
                    debug!(
                        pulled = outcome.pulled,
                        failures = outcome.failures.len(),
                        "debounced pass completed"
                    );
                }
                Err(SyncError::ConcurrentSyncInProgress) => {
                    // The running pass will be followed by the next tick;
                    // the settled events are not lost, just late.
                    warn!("debounced pass rejected: pass already in flight");
                }
                Err(e) => {
                    warn!(error = %e, "debounced pass failed");
                }
            }
        });
    }

    /// Stops the scheduler.
    ///
    /// Cancels the periodic timer and any pending debounce timer; when this
    /// returns, no trigger can fire anymore.
    pub async fn stop(&self) {
        info!("scheduler stopping");
        self.token.cancel();

        let pending_timer = {
            let mut debounce = self.debounce.lock().unwrap_or_else(|p| p.into_inner());
            debounce.take_handle()
        };
        if let Some(handle) = pending_timer {
            handle.abort();
            let _ = handle.await;
        }

        let tick = {
            let mut tick_task = self.tick_task.lock().unwrap_or_else(|p| p.into_inner());
            tick_task.take()
        };
        if let Some(handle) = tick {
            let _ = handle.await;
        }
        info!("scheduler stopped");
    }
}

// ============================================================================
// Tests
// ============================================================================
