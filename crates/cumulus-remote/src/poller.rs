//! Long-poll event source
//!
//! Implements the [`EventSource`] port with a cursor-based long poll against
//! `GET /events`. The server holds the request open until events arrive or
//! its poll window elapses, then answers with the batch and the cursor for
//! the next call. Reconnect and backoff policy live in the event channel of
//! `cumulus-sync`; this adapter only performs single polls.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::debug;
use url::Url;

use cumulus_core::domain::newtypes::ClientId;
use cumulus_core::ports::event_source::{EventBatch, EventSource};

/// How long a single poll request may stay open before the HTTP client
/// gives up. Kept above typical server-side poll windows so the server,
/// not the client, ends an idle poll.
const POLL_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Header mirroring the one sent by the REST store client.
const CLIENT_ID_HEADER: &str = "x-cumulus-client";

/// Cursor-based long-poll adapter for the push-event feed.
pub struct LongPollEventSource {
    /// HTTP client with a long request timeout
    client: Client,
    /// Base URL for API requests (no trailing slash)
    base_url: String,
    /// This client's identity, so the feed can flag self-originated events
    client_id: ClientId,
}

impl LongPollEventSource {
    /// Creates an event source for the given API base URL.
    pub fn new(base_url: impl Into<String>, client_id: ClientId) -> Result<Self> {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Url::parse(&base_url).with_context(|| format!("invalid event feed base URL: {base_url}"))?;
        let client = Client::builder()
            .timeout(POLL_REQUEST_TIMEOUT)
            .build()
            .context("Failed to build long-poll HTTP client")?;
        Ok(Self {
            client,
            base_url,
            client_id,
        })
    }

    /// The configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl EventSource for LongPollEventSource {
    async fn poll_events(&self, cursor: Option<&str>) -> Result<EventBatch> {
        let url = format!("{}/events", self.base_url);
        let mut req = self
            .client
            .get(&url)
            .header(CLIENT_ID_HEADER, self.client_id.to_string());
        if let Some(cursor) = cursor {
            req = req.query(&[("cursor", cursor)]);
        }

        debug!(?cursor, "polling event feed");
        let batch: EventBatch = req
            .send()
            .await
            .context("Failed to poll /events")?
            .error_for_status()
            .context("GET /events returned error status")?
            .json()
            .await
            .context("Failed to parse event batch")?;

        debug!(
            events = batch.events.len(),
            cursor = ?batch.cursor,
            "event batch received"
        );
        Ok(batch)
    }
}
