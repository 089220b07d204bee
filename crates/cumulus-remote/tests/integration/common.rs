//! Shared test helpers for the REST adapter integration tests
//!
//! Provides wiremock-based mock server setup for the file-store API.
//! Each helper mounts the necessary mock endpoints and returns a configured
//! adapter pointing at the mock server.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cumulus_core::domain::newtypes::ClientId;
use cumulus_remote::{LongPollEventSource, RestRemoteStore};

/// Starts a mock server and returns it with a store client pointed at it.
pub async fn setup_store() -> (MockServer, RestRemoteStore) {
    let server = MockServer::start().await;
    let store = RestRemoteStore::new(server.uri(), ClientId::new());
    (server, store)
}

/// Starts a mock server and returns it with an event source pointed at it.
pub async fn setup_events() -> (MockServer, LongPollEventSource) {
    let server = MockServer::start().await;
    let source = LongPollEventSource::new(server.uri(), ClientId::new()).unwrap();
    (server, source)
}

/// Mounts `GET /entries` returning the given entries JSON array.
pub async fn mount_listing(server: &MockServer, entries: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/entries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries))
        .mount(server)
        .await;
}

/// JSON for a live file entry.
pub fn file_entry(id: &str, name: &str, parent_id: Option<&str>, size: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "parent_id": parent_id,
        "kind": "file",
        "modified": "2026-03-01T10:00:00Z",
        "size": size,
        "deleted": false
    })
}

/// JSON for a live folder entry.
pub fn folder_entry(id: &str, name: &str, parent_id: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "parent_id": parent_id,
        "kind": "folder",
        "modified": null,
        "size": null,
        "deleted": false
    })
}
