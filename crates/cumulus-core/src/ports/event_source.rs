//! Event source port (driven/secondary port)
//!
//! The push-event feed is consumed through a cursor-based long poll: each
//! call blocks server-side until events are available (or the poll window
//! elapses) and returns the batch plus the cursor for the next call.
//! Reconnect and backoff policy live above this port, in the event channel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload of a change message: which entry was affected
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePayload {
    /// Remote id of the affected entry
    #[serde(default)]
    pub id: Option<String>,
    /// `"file"` or `"folder"`
    #[serde(default)]
    pub kind: Option<String>,
}

/// One message as delivered by the event feed.
///
/// Recognized `type` values are the change kinds plus connection-lifecycle
/// signals (`"connected"`); unknown types are skipped by the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Message type discriminator
    #[serde(rename = "type")]
    pub event_type: String,
    /// Affected entry, absent for lifecycle signals
    #[serde(default)]
    pub payload: WirePayload,
    /// Client that caused the change, when the backend reports it
    #[serde(default)]
    pub origin_client_id: Option<Uuid>,
}

/// A batch of events plus the continuation cursor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    /// Events in arrival order
    pub events: Vec<WireEvent>,
    /// Cursor to pass on the next poll (None resets to "latest")
    pub cursor: Option<String>,
}

/// Port trait for the push-event feed
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Long-polls for the next batch of events.
    ///
    /// A `None` cursor subscribes from "now". A successful return counts as
    /// a healthy connection; an `Err` counts as a disconnect and feeds the
    /// channel's reconnect/backoff logic.
    async fn poll_events(&self, cursor: Option<&str>) -> anyhow::Result<EventBatch>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_event_deserializes_change_message() {
        let json = r#"{
            "type": "created",
            "payload": { "id": "f-42", "kind": "file" },
            "origin_client_id": "6dd9af17-63c7-4ce4-80f3-f2f2e9a5934a"
        }"#;
        let ev: WireEvent = serde_json::from_str(json).unwrap();
        assert_eq!(ev.event_type, "created");
        assert_eq!(ev.payload.id.as_deref(), Some("f-42"));
        assert_eq!(ev.payload.kind.as_deref(), Some("file"));
        assert!(ev.origin_client_id.is_some());
    }

    #[test]
    fn test_wire_event_lifecycle_message_has_empty_payload() {
        let json = r#"{ "type": "connected" }"#;
        let ev: WireEvent = serde_json::from_str(json).unwrap();
        assert_eq!(ev.event_type, "connected");
        assert!(ev.payload.id.is_none());
        assert!(ev.origin_client_id.is_none());
    }

    #[test]
    fn test_event_batch_round_trip() {
        let batch = EventBatch {
            events: vec![WireEvent {
                event_type: "deleted".to_string(),
                payload: WirePayload {
                    id: Some("e-1".to_string()),
                    kind: Some("folder".to_string()),
                },
                origin_client_id: None,
            }],
            cursor: Some("c-17".to_string()),
        };
        let json = serde_json::to_string(&batch).unwrap();
        let back: EventBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(batch, back);
    }
}
