//! Event channel - durable subscription to remote change notifications
//!
//! The [`EventChannel`] owns one logical subscription to the push-event
//! feed. It converts wire messages into typed [`ChangeEvent`]s and delivers
//! them, in arrival order, to subscribers registered per event kind or as
//! wildcards.
//!
//! ## Reconnect policy
//!
//! A failed poll counts as a disconnect. The channel retries with
//! exponential backoff (`delay = min(base * 2^attempt, max)`) up to a
//! bounded number of attempts; a successful poll resets the counter. When
//! the budget is exhausted the channel emits a single terminal degraded
//! signal with a human-readable reason and goes dormant until explicitly
//! restarted. It never retries silently forever and never panics the
//! process.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cumulus_core::config::Config;
use cumulus_core::domain::event::{ChangeEvent, ChangeKind};
use cumulus_core::domain::newtypes::ClientId;
use cumulus_core::ports::event_source::EventSource;

// ============================================================================
// Backoff
// ============================================================================

/// Exponential backoff schedule with a ceiling.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Creates a schedule with the given base delay and ceiling.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before reconnect attempt `attempt` (1-based):
    /// `min(base * 2^attempt, max)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base.as_millis().min(u128::from(u64::MAX)) as u64;
        let max_ms = self.max.as_millis().min(u128::from(u64::MAX)) as u64;
        let shift = attempt.min(16);
        let exp = base_ms.saturating_mul(1u64 << shift).min(max_ms);
        Duration::from_millis(exp)
    }
}

// ============================================================================
// Subscriber registry (typed pub/sub bus)
// ============================================================================

/// Callback invoked for each delivered change event.
pub type EventHandler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Callback invoked once when the channel degrades.
pub type DegradedHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-kind and wildcard subscriber table.
///
/// Events are delivered in arrival order; within one event, kind-specific
/// subscribers run before wildcards. A panicking handler is isolated so it
/// cannot prevent delivery to the remaining subscribers.
#[derive(Default)]
pub struct SubscriberRegistry {
    by_kind: StdMutex<HashMap<ChangeKind, Vec<EventHandler>>>,
    wildcard: StdMutex<Vec<EventHandler>>,
    degraded: StdMutex<Vec<DegradedHandler>>,
}

impl SubscriberRegistry {
    fn subscribe(&self, kind: ChangeKind, handler: EventHandler) {
        self.by_kind
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(kind)
            .or_default()
            .push(handler);
    }

    fn subscribe_all(&self, handler: EventHandler) {
        self.wildcard
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(handler);
    }

    fn on_degraded(&self, handler: DegradedHandler) {
        self.degraded
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(handler);
    }

    fn dispatch(&self, event: &ChangeEvent) {
        let handlers: Vec<EventHandler> = {
            let by_kind = self.by_kind.lock().unwrap_or_else(|p| p.into_inner());
            let wildcard = self.wildcard.lock().unwrap_or_else(|p| p.into_inner());
            by_kind
                .get(&event.kind)
                .into_iter()
                .flatten()
                .chain(wildcard.iter())
                .cloned()
                .collect()
        };

        for handler in handlers {
            let outcome =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(event)));
            if outcome.is_err() {
                warn!(kind = ?event.kind, "event subscriber panicked; continuing delivery");
            }
        }
    }

    fn dispatch_degraded(&self, reason: &str) {
        let handlers: Vec<DegradedHandler> = self
            .degraded
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        for handler in handlers {
            let outcome =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(reason)));
            if outcome.is_err() {
                warn!("degraded-signal subscriber panicked");
            }
        }
    }
}

// ============================================================================
// EventChannel
// ============================================================================

/// Handle to a running channel; stopping it closes the subscription without
/// triggering the retry logic.
pub struct ChannelHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    /// Closes the channel and waits for the poll loop to wind down.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// The push-event channel for one session's owning identity.
pub struct EventChannel {
    source: Arc<dyn EventSource>,
    registry: Arc<SubscriberRegistry>,
    backoff: Backoff,
    max_attempts: u32,
}

impl EventChannel {
    /// Creates a channel over the given event source.
    pub fn new(source: Arc<dyn EventSource>, config: &Config) -> Self {
        Self {
            source,
            registry: Arc::new(SubscriberRegistry::default()),
            backoff: Backoff::new(
                Duration::from_millis(config.events.backoff_base_ms),
                Duration::from_millis(config.events.backoff_max_ms),
            ),
            max_attempts: config.events.max_reconnect_attempts,
        }
    }

    /// Registers a subscriber for one event kind.
    pub fn subscribe(&self, kind: ChangeKind, handler: impl Fn(&ChangeEvent) + Send + Sync + 'static) {
        self.registry.subscribe(kind, Arc::new(handler));
    }

    /// Registers a wildcard subscriber receiving every event kind.
    pub fn subscribe_all(&self, handler: impl Fn(&ChangeEvent) + Send + Sync + 'static) {
        self.registry.subscribe_all(Arc::new(handler));
    }

    /// Registers a handler for the terminal degraded signal.
    pub fn on_degraded(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.registry.on_degraded(Arc::new(handler));
    }

    /// Starts the subscription loop.
    ///
    /// Returns a handle whose [`stop`](ChannelHandle::stop) closes the
    /// channel cleanly. After a degraded signal the loop is dormant; calling
    /// `start` again begins a fresh subscription with a reset attempt
    /// counter.
    pub fn start(&self, parent: &CancellationToken) -> ChannelHandle {
        let token = parent.child_token();
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.source),
            Arc::clone(&self.registry),
            self.backoff,
            self.max_attempts,
            token.clone(),
        ));
        ChannelHandle {
            token,
            task: Some(task),
        }
    }
}

async fn run_loop(
    source: Arc<dyn EventSource>,
    registry: Arc<SubscriberRegistry>,
    backoff: Backoff,
    max_attempts: u32,
    token: CancellationToken,
) {
    info!("event channel connecting");
    let mut cursor: Option<String> = None;
    let mut attempt: u32 = 0;

    loop {
        let poll = tokio::select! {
            _ = token.cancelled() => {
                info!("event channel closed");
                return;
            }
            poll = source.poll_events(cursor.as_deref()) => poll,
        };

        match poll {
            Ok(batch) => {
                if attempt > 0 {
                    info!(attempt, "event channel reconnected");
                }
                attempt = 0;
                if batch.cursor.is_some() {
                    cursor = batch.cursor;
                }

                for wire in &batch.events {
                    let origin = wire.origin_client_id.map(ClientId::from_uuid);
                    match ChangeEvent::from_wire(
                        &wire.event_type,
                        wire.payload.id.as_deref(),
                        wire.payload.kind.as_deref(),
                        origin,
                    ) {
                        Ok(Some(event)) => {
                            debug!(kind = ?event.kind, id = %event.subject_id, "delivering event");
                            registry.dispatch(&event);
                        }
                        Ok(None) => {
                            debug!(event_type = %wire.event_type, "lifecycle message");
                        }
                        Err(err) => {
                            warn!(event_type = %wire.event_type, %err, "dropping malformed event");
                        }
                    }
                }
            }
            Err(err) => {
                attempt += 1;
                let delay = backoff.delay(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = format!("{err:#}"),
                    "event poll failed"
                );

                tokio::select! {
                    _ = token.cancelled() => {
                        info!("event channel closed during backoff");
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }

                if attempt >= max_attempts {
                    let reason = format!(
                        "event feed unreachable after {max_attempts} reconnect attempts: {err:#}"
                    );
                    warn!(%reason, "event channel degraded");
                    registry.dispatch_degraded(&reason);
                    return;
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
