//! Cumulus Daemon - Background synchronization service
//!
//! This binary wires the adapters to the engine and runs until stopped:
//! - claims the directory grant for the configured sync root
//! - restores persisted session state (label, sub-path, last sync time)
//! - starts the scheduler (periodic + debounced passes) and event channel
//! - shuts down gracefully on SIGTERM/SIGINT, saving session state

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cumulus_core::config::Config;
use cumulus_core::domain::grant::DirectoryGrant;
use cumulus_core::domain::newtypes::{ClientId, VaultPath};
use cumulus_core::domain::session::SyncSession;
use cumulus_core::ports::session_store::SessionStore;
use cumulus_remote::{LongPollEventSource, RestRemoteStore};
use cumulus_sync::engine::SyncEngine;
use cumulus_sync::events::EventChannel;
use cumulus_sync::persist::JsonSessionStore;
use cumulus_sync::scheduler::Scheduler;
use cumulus_sync::vault::VaultAdapter;

/// Waits for SIGTERM or SIGINT and triggers the cancellation token.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!("Cumulus daemon starting (cumulusd)");

    // Configuration
    let config_path = Config::default_path();
    let config = Config::load_or_default(&config_path);
    let validation_errors = config.validate();
    if !validation_errors.is_empty() {
        for err in &validation_errors {
            error!(%err, "invalid configuration");
        }
        anyhow::bail!("configuration invalid: {} error(s)", validation_errors.len());
    }
    info!(config_path = %config_path.display(), "configuration loaded");

    // Claim the directory grant. Failure here is the explicit signal that
    // the user must (re-)select a sync directory; there is nothing to retry.
    let root = VaultPath::new(config.sync.root.clone())
        .map_err(|e| anyhow::anyhow!("invalid sync root: {e}"))?;
    let grant = DirectoryGrant::claim(root)
        .with_context(|| format!("cannot claim sync root {}", config.sync.root.display()))?;
    info!(root = %grant.root(), label = grant.label(), "directory grant claimed");

    // Restore persisted session state.
    let store = JsonSessionStore::new(JsonSessionStore::default_path());
    let stored = match store.load().await {
        Ok(state) => state,
        Err(e) => {
            warn!(error = format!("{e:#}"), "stored session state unreadable, starting fresh");
            None
        }
    };
    let mut session = SyncSession::new(grant, stored.as_ref().and_then(|s| s.sub_path.clone()));
    if let Some(last_sync) = stored.as_ref().and_then(|s| s.last_sync) {
        session.record_sync(last_sync);
    }
    session.set_running(true);

    // Adapters and engine.
    let client_id = ClientId::new();
    let remote = Arc::new(RestRemoteStore::new(
        config.remote.base_url.clone(),
        client_id,
    ));
    let event_source = Arc::new(
        LongPollEventSource::new(config.remote.base_url.clone(), client_id)
            .context("failed to build event source")?,
    );
    let vault = Arc::new(VaultAdapter::new());

    let shutdown = CancellationToken::new();
    let engine = Arc::new(SyncEngine::new(
        remote,
        vault,
        session,
        &config,
        shutdown.child_token(),
    ));

    // Scheduler: periodic ticks plus debounced event-triggered passes.
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&engine), client_id, &config));

    // Event channel feeds the scheduler's debounce window.
    let channel = EventChannel::new(event_source, &config);
    {
        let scheduler = Arc::clone(&scheduler);
        channel.subscribe_all(move |event| scheduler.handle_event(event));
    }
    channel.on_degraded(|reason| {
        warn!(%reason, "live notifications lost; periodic passes continue");
    });

    // Signal handling.
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    // Start everything, then run one full pass up front.
    let channel_handle = channel.start(&shutdown);
    scheduler.start();
    match scheduler.trigger_now().await {
        Ok(outcome) => info!(
            pushed = outcome.pushed,
            pulled = outcome.pulled,
            failures = outcome.failures.len(),
            "startup pass completed"
        ),
        Err(e) => warn!(error = %e, "startup pass failed"),
    }

    shutdown.cancelled().await;
    info!("shutting down");

    scheduler.stop().await;
    channel_handle.stop().await;

    // Persist the session state for the next run.
    let state = {
        let mut session = engine.session().lock().await;
        session.set_running(false);
        session.to_state(config.sync.poll_interval_secs)
    };
    if let Err(e) = store.save(&state).await {
        warn!(error = format!("{e:#}"), "failed to save session state");
    }

    info!("Cumulus daemon shut down gracefully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_cancellation_token_child_propagation() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
