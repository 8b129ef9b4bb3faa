//! Realtime event model.
//!
//! Events are tagged JSON objects. The only field this subsystem ever
//! interprets is the `type` tag; everything else in the payload belongs to
//! whichever mutation handler produced the event.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::TaskliveResult;

/// Control event type sent once when a stream opens.
pub const EVENT_CONNECTED: &str = "connected";

/// Control event type sent periodically to keep intermediaries from
/// timing out idle streams.
pub const EVENT_HEARTBEAT: &str = "heartbeat";

/// A single realtime event pushed to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type tag (`connected`, `heartbeat`, or any application type).
    #[serde(rename = "type")]
    pub kind: String,

    /// Opaque payload fields, flattened next to the tag on the wire.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Event {
    /// Create an event with an empty payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
        }
    }

    /// Create an event carrying a JSON object payload.
    ///
    /// Only object payloads can sit next to the `type` tag; any other
    /// JSON value is dropped with a warning.
    pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            other => {
                tracing::warn!(payload = %other, "Non-object event payload dropped");
                Map::new()
            }
        };
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// The `connected` control event.
    pub fn connected() -> Self {
        Self::new(EVENT_CONNECTED)
    }

    /// The `heartbeat` control event.
    pub fn heartbeat() -> Self {
        Self::new(EVENT_HEARTBEAT)
    }

    /// Whether this is a protocol-level control event, consumed by the
    /// transport layer and never surfaced to application logic.
    pub fn is_control(&self) -> bool {
        self.kind == EVENT_CONNECTED || self.kind == EVENT_HEARTBEAT
    }

    /// Serialize to the JSON text written to each connection.
    pub fn to_json(&self) -> TaskliveResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_and_payload_are_flattened() {
        let event = Event::with_payload("task-updated", json!({"id": 42}));
        assert_eq!(event.to_json().unwrap(), r#"{"type":"task-updated","id":42}"#);
    }

    #[test]
    fn test_control_classification() {
        assert!(Event::connected().is_control());
        assert!(Event::heartbeat().is_control());
        assert!(!Event::new("task-created").is_control());
    }

    #[test]
    fn test_non_object_payload_is_dropped() {
        let event = Event::with_payload("task-updated", json!([1, 2, 3]));
        assert!(event.payload.is_empty());
    }

    #[test]
    fn test_roundtrip_preserves_unknown_fields() {
        let raw = r#"{"type":"comment-posted","task_id":"t1","body":"hi"}"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        assert_eq!(event.kind, "comment-posted");
        assert_eq!(event.payload.get("body"), Some(&json!("hi")));
    }
}
