//! Long-poll event feed adapter behavior.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use cumulus_core::ports::event_source::EventSource;

use crate::common::setup_events;

#[tokio::test]
async fn poll_without_cursor_subscribes_from_now() {
    let (server, source) = setup_events().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "events": [],
            "cursor": "c-1"
        })))
        .mount(&server)
        .await;

    let batch = source.poll_events(None).await.unwrap();
    assert!(batch.events.is_empty());
    assert_eq!(batch.cursor.as_deref(), Some("c-1"));
}

#[tokio::test]
async fn poll_with_cursor_passes_it_through() {
    let (server, source) = setup_events().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(query_param("cursor", "c-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "events": [
                {
                    "type": "created",
                    "payload": { "id": "f-9", "kind": "file" },
                    "origin_client_id": null
                },
                {
                    "type": "renamed",
                    "payload": { "id": "d-2", "kind": "folder" },
                    "origin_client_id": null
                }
            ],
            "cursor": "c-2"
        })))
        .mount(&server)
        .await;

    let batch = source.poll_events(Some("c-1")).await.unwrap();
    assert_eq!(batch.events.len(), 2);
    assert_eq!(batch.events[0].event_type, "created");
    assert_eq!(batch.events[0].payload.id.as_deref(), Some("f-9"));
    assert_eq!(batch.events[1].event_type, "renamed");
    assert_eq!(batch.cursor.as_deref(), Some("c-2"));
}

#[tokio::test]
async fn poll_error_status_is_an_error() {
    let (server, source) = setup_events().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    assert!(source.poll_events(None).await.is_err());
}

#[tokio::test]
async fn poll_tolerates_unknown_event_types() {
    let (server, source) = setup_events().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "events": [
                { "type": "connected" },
                { "type": "quota_changed", "payload": {} }
            ],
            "cursor": "c-3"
        })))
        .mount(&server)
        .await;

    // The adapter is transport-only: unknown types arrive intact and the
    // channel layer decides what to skip.
    let batch = source.poll_events(None).await.unwrap();
    assert_eq!(batch.events.len(), 2);
    assert_eq!(batch.events[0].event_type, "connected");
}
