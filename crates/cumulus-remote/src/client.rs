//! REST client for the remote file store
//!
//! Implements the [`RemoteStore`] port against the backend's JSON API.
//! Endpoint layout:
//!
//! ```text
//! GET    /entries                  list the full directory index
//! POST   /folders                  create a folder
//! POST   /files                    upload a new file (raw body)
//! PUT    /entries/{id}/content     replace file content (raw body)
//! PATCH  /entries/{id}             update metadata (rename / move)
//! DELETE /entries/{id}             move to trash
//! POST   /entries/{id}/restore     restore from trash
//! GET    /entries/{id}/content     download content
//! POST   /entries/{id}/lock        take the editorial lock
//! DELETE /entries/{id}/lock        release the editorial lock
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use cumulus_core::domain::newtypes::ClientId;
use cumulus_core::ports::remote_store::{Entry, MetadataPatch, RemoteStore};

/// Header used so the backend can attribute changes to this client and echo
/// the id back in `origin_client_id` on the event feed.
const CLIENT_ID_HEADER: &str = "x-cumulus-client";

// ============================================================================
// Request/response DTOs
// ============================================================================

/// Body of `POST /folders`
#[derive(Debug, Serialize)]
struct CreateFolderRequest<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
}

/// Response of `POST /entries/{id}/lock`
#[derive(Debug, Deserialize)]
struct LockResponse {
    locked: bool,
}

// ============================================================================
// RestRemoteStore
// ============================================================================

/// HTTP adapter implementing the [`RemoteStore`] port.
pub struct RestRemoteStore {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests (no trailing slash)
    base_url: String,
    /// This client's identity, sent on every mutating request
    client_id: ClientId,
}

impl RestRemoteStore {
    /// Creates a store client for the given API base URL.
    ///
    /// # Arguments
    /// * `base_url` - e.g. `https://files.example.com/api`
    /// * `client_id` - identity reported to the backend for event attribution
    pub fn new(base_url: impl Into<String>, client_id: ClientId) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
            client_id,
        }
    }

    /// The configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// This client's identity
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Creates a request builder for the given method and path, with the
    /// client-id header attached.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .header(CLIENT_ID_HEADER, self.client_id.to_string())
    }
}

#[async_trait::async_trait]
impl RemoteStore for RestRemoteStore {
    async fn list_entries(&self) -> Result<Vec<Entry>> {
        debug!("listing remote entries");
        let entries: Vec<Entry> = self
            .request(Method::GET, "/entries")
            .send()
            .await
            .context("Failed to fetch /entries")?
            .error_for_status()
            .context("GET /entries returned error status")?
            .json()
            .await
            .context("Failed to parse /entries response")?;

        debug!(count = entries.len(), "entry listing received");
        Ok(entries)
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<Entry> {
        debug!(name, ?parent_id, "creating remote folder");
        let entry: Entry = self
            .request(Method::POST, "/folders")
            .json(&CreateFolderRequest { name, parent_id })
            .send()
            .await
            .context("Failed to POST /folders")?
            .error_for_status()
            .context("POST /folders returned error status")?
            .json()
            .await
            .context("Failed to parse created folder")?;

        Ok(entry)
    }

    async fn upload_file(
        &self,
        name: &str,
        parent_id: Option<&str>,
        data: &[u8],
    ) -> Result<Entry> {
        debug!(name, ?parent_id, bytes = data.len(), "uploading new file");
        let mut req = self
            .request(Method::POST, "/files")
            .query(&[("name", name)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data.to_vec());
        if let Some(parent) = parent_id {
            req = req.query(&[("parent_id", parent)]);
        }

        let entry: Entry = req
            .send()
            .await
            .context("Failed to POST /files")?
            .error_for_status()
            .context("POST /files returned error status")?
            .json()
            .await
            .context("Failed to parse uploaded file entry")?;

        Ok(entry)
    }

    async fn update_file_content(&self, id: &str, data: &[u8]) -> Result<()> {
        debug!(id, bytes = data.len(), "updating file content");
        self.request(Method::PUT, &format!("/entries/{id}/content"))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data.to_vec())
            .send()
            .await
            .with_context(|| format!("Failed to PUT /entries/{id}/content"))?
            .error_for_status()
            .context("Content update returned error status")?;
        Ok(())
    }

    async fn update_metadata(&self, id: &str, patch: &MetadataPatch) -> Result<()> {
        debug!(id, ?patch, "updating entry metadata");
        self.request(Method::PATCH, &format!("/entries/{id}"))
            .json(patch)
            .send()
            .await
            .with_context(|| format!("Failed to PATCH /entries/{id}"))?
            .error_for_status()
            .context("Metadata update returned error status")?;
        Ok(())
    }

    async fn delete_entry(&self, id: &str) -> Result<()> {
        debug!(id, "deleting entry");
        self.request(Method::DELETE, &format!("/entries/{id}"))
            .send()
            .await
            .with_context(|| format!("Failed to DELETE /entries/{id}"))?
            .error_for_status()
            .context("Delete returned error status")?;
        Ok(())
    }

    async fn restore_entry(&self, id: &str) -> Result<()> {
        debug!(id, "restoring entry");
        self.request(Method::POST, &format!("/entries/{id}/restore"))
            .send()
            .await
            .with_context(|| format!("Failed to POST /entries/{id}/restore"))?
            .error_for_status()
            .context("Restore returned error status")?;
        Ok(())
    }

    async fn download_entry(&self, id: &str) -> Result<Vec<u8>> {
        debug!(id, "downloading entry (buffered)");
        let bytes = self
            .request(Method::GET, &format!("/entries/{id}/content"))
            .send()
            .await
            .with_context(|| format!("Failed to GET /entries/{id}/content"))?
            .error_for_status()
            .context("Download returned error status")?
            .bytes()
            .await
            .context("Failed to read download body")?;
        Ok(bytes.to_vec())
    }

    async fn download_entry_to(&self, id: &str, dest: &Path) -> Result<u64> {
        debug!(id, dest = %dest.display(), "downloading entry (streamed)");
        let response = self
            .request(Method::GET, &format!("/entries/{id}/content"))
            .send()
            .await
            .with_context(|| format!("Failed to GET /entries/{id}/content"))?
            .error_for_status()
            .context("Download returned error status")?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create staging file {}", dest.display()))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read download chunk")?;
            file.write_all(&chunk)
                .await
                .context("Failed to write download chunk")?;
            written += chunk.len() as u64;
        }
        file.flush().await.context("Failed to flush staging file")?;

        debug!(id, written, "streamed download complete");
        Ok(written)
    }

    async fn lock(&self, id: &str) -> Result<bool> {
        debug!(id, "requesting editorial lock");
        let response = self
            .request(Method::POST, &format!("/entries/{id}/lock"))
            .send()
            .await
            .with_context(|| format!("Failed to POST /entries/{id}/lock"))?;

        // A refused lock is a normal answer, not a transport failure.
        if response.status() == StatusCode::CONFLICT || response.status() == StatusCode::LOCKED {
            warn!(id, "lock refused: held by another client");
            return Ok(false);
        }

        let body: LockResponse = response
            .error_for_status()
            .context("Lock returned error status")?
            .json()
            .await
            .context("Failed to parse lock response")?;

        Ok(body.locked)
    }

    async fn unlock(&self, id: &str) -> Result<()> {
        debug!(id, "releasing editorial lock");
        self.request(Method::DELETE, &format!("/entries/{id}/lock"))
            .send()
            .await
            .with_context(|| format!("Failed to DELETE /entries/{id}/lock"))?
            .error_for_status()
            .context("Unlock returned error status")?;
        Ok(())
    }
}
