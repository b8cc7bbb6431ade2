//! Inbound event envelope.
//!
//! Every frame received from the backend is decoded once into an [`Event`]:
//! an immutable, cheaply clonable view over the JSON payload with the
//! commonly used fields pulled out. Unknown fields are preserved and stay
//! reachable through [`Event::raw`] and [`Event::get`].
//!
//! ```rust,ignore
//! let event = Event::from_slice(br#"{"message_type":"group","group_id":1,"user_id":2}"#)?;
//! assert!(event.is_group());
//! assert_eq!(event.source_id(), Some(1));
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EventError, EventResult};
use crate::message::Message;

// =============================================================================
// EventKind
// =============================================================================

/// Classification of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A message posted in a group.
    #[serde(alias = "group")]
    GroupMessage,
    /// A direct message.
    #[serde(alias = "private")]
    PrivateMessage,
    /// A notice (member joined, recall, poke, ...).
    Notice,
    /// A friend or group request.
    Request,
    /// Heartbeat and lifecycle meta events.
    #[serde(alias = "meta_event")]
    Meta,
    /// The backend's answer to an action we sent.
    #[serde(alias = "action_response")]
    Response,
    /// Anything not recognised above.
    Unknown,
}

impl EventKind {
    /// Returns the canonical name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GroupMessage => "group_message",
            Self::PrivateMessage => "private_message",
            Self::Notice => "notice",
            Self::Request => "request",
            Self::Meta => "meta",
            Self::Response => "response",
            Self::Unknown => "unknown",
        }
    }

    /// Returns `true` for group and private messages.
    pub fn is_message(&self) -> bool {
        matches!(self, Self::GroupMessage | Self::PrivateMessage)
    }

    fn classify(payload: &serde_json::Map<String, Value>) -> Self {
        match payload.get("message_type").and_then(Value::as_str) {
            Some("group") => return Self::GroupMessage,
            Some("private") => return Self::PrivateMessage,
            _ => {}
        }

        match payload.get("post_type").and_then(Value::as_str) {
            Some("notice") => return Self::Notice,
            Some("request") => return Self::Request,
            Some("meta_event") => return Self::Meta,
            _ => {}
        }

        if payload.contains_key("echo") || payload.contains_key("retcode") {
            return Self::Response;
        }

        Self::Unknown
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Event
// =============================================================================

#[derive(Debug)]
struct EventInner {
    payload: Value,
    kind: EventKind,
    source_id: Option<i64>,
    sender_id: Option<i64>,
    message_id: Option<i64>,
    raw_text: String,
}

/// A decoded inbound frame.
///
/// Cloning is an `Arc` bump; all clones observe the same payload and none of
/// them can mutate it.
#[derive(Debug, Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    /// Decodes a frame. Fails when the bytes are not a JSON object.
    pub fn from_slice(data: &[u8]) -> EventResult<Self> {
        let value: Value = serde_json::from_slice(data)?;
        Self::from_value(value)
    }

    /// Wraps an already decoded payload. Fails when it is not an object.
    pub fn from_value(payload: Value) -> EventResult<Self> {
        let Value::Object(map) = &payload else {
            return Err(EventError::NotAnObject {
                got: json_type_name(&payload),
            });
        };

        let kind = EventKind::classify(map);
        let group_id = map.get("group_id").and_then(parse_id);
        let user_id = map.get("user_id").and_then(parse_id).or_else(|| {
            map.get("sender")
                .and_then(|s| s.get("user_id"))
                .and_then(parse_id)
        });

        let source_id = match kind {
            EventKind::GroupMessage => group_id,
            EventKind::PrivateMessage => user_id,
            _ => group_id.or(user_id),
        };

        let message_id = map.get("message_id").and_then(parse_id);
        let raw_text = map
            .get("raw_message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            inner: Arc::new(EventInner {
                kind,
                source_id,
                sender_id: user_id,
                message_id,
                raw_text,
                payload,
            }),
        })
    }

    /// The classification of this frame.
    pub fn kind(&self) -> EventKind {
        self.inner.kind
    }

    /// Group id for group traffic, user id for private traffic.
    pub fn source_id(&self) -> Option<i64> {
        self.inner.source_id
    }

    /// The user who produced the event, if any.
    pub fn sender_id(&self) -> Option<i64> {
        self.inner.sender_id
    }

    /// Alias for [`sender_id`](Self::sender_id).
    pub fn user_id(&self) -> Option<i64> {
        self.inner.sender_id
    }

    /// The group id, present only on group traffic.
    pub fn group_id(&self) -> Option<i64> {
        self.inner.payload.get("group_id").and_then(parse_id)
    }

    pub fn message_id(&self) -> Option<i64> {
        self.inner.message_id
    }

    /// The `raw_message` text, empty when absent.
    pub fn raw_text(&self) -> &str {
        &self.inner.raw_text
    }

    /// The raw `message_type` field, empty when absent.
    pub fn message_type(&self) -> &str {
        self.inner
            .payload
            .get("message_type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// The full untyped payload.
    pub fn raw(&self) -> &Value {
        &self.inner.payload
    }

    /// Looks up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.payload.get(key)
    }

    /// Decodes the `message` field, if present and well-formed.
    pub fn message(&self) -> Option<Message> {
        let value = self.inner.payload.get("message")?;
        Message::deserialize(value).ok()
    }

    pub fn is_group(&self) -> bool {
        self.inner.kind == EventKind::GroupMessage
    }

    pub fn is_private(&self) -> bool {
        self.inner.kind == EventKind::PrivateMessage
    }

    pub fn is_message(&self) -> bool {
        self.inner.kind.is_message()
    }
}

impl TryFrom<Value> for Event {
    type Error = EventError;

    fn try_from(value: Value) -> EventResult<Self> {
        Self::from_value(value)
    }
}

/// Accepts ids sent as numbers or as digit strings.
fn parse_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_message_fields() {
        let event = Event::from_value(json!({
            "post_type": "message",
            "message_type": "group",
            "group_id": 12345,
            "user_id": 678,
            "message_id": 42,
            "raw_message": "hello",
            "extra": {"nested": true}
        }))
        .unwrap();

        assert_eq!(event.kind(), EventKind::GroupMessage);
        assert!(event.is_group());
        assert_eq!(event.source_id(), Some(12345));
        assert_eq!(event.sender_id(), Some(678));
        assert_eq!(event.message_id(), Some(42));
        assert_eq!(event.raw_text(), "hello");
        assert_eq!(event.get("extra"), Some(&json!({"nested": true})));
    }

    #[test]
    fn test_private_message_source_is_user() {
        let event = Event::from_value(json!({
            "message_type": "private",
            "user_id": "5551",
        }))
        .unwrap();

        assert!(event.is_private());
        assert_eq!(event.source_id(), Some(5551));
        assert_eq!(event.group_id(), None);
        assert_eq!(event.raw_text(), "");
    }

    #[test]
    fn test_classification() {
        let kind = |v: Value| Event::from_value(v).unwrap().kind();

        assert_eq!(kind(json!({"post_type": "notice"})), EventKind::Notice);
        assert_eq!(kind(json!({"post_type": "request"})), EventKind::Request);
        assert_eq!(kind(json!({"post_type": "meta_event"})), EventKind::Meta);
        assert_eq!(
            kind(json!({"status": "ok", "retcode": 0, "echo": "x"})),
            EventKind::Response
        );
        assert_eq!(kind(json!({"foo": 1})), EventKind::Unknown);
        assert_eq!(
            kind(json!({"post_type": "message", "message_type": "guild"})),
            EventKind::Unknown
        );
    }

    #[test]
    fn test_rejects_non_objects() {
        assert!(matches!(
            Event::from_slice(b"[1, 2]"),
            Err(EventError::NotAnObject { got: "array" })
        ));
        assert!(matches!(
            Event::from_slice(b"{not json"),
            Err(EventError::Malformed(_))
        ));
    }

    #[test]
    fn test_message_field_decodes() {
        let event = Event::from_value(json!({
            "message_type": "private",
            "user_id": 1,
            "message": [{"type": "text", "data": {"text": "ping"}}]
        }))
        .unwrap();
        assert_eq!(event.message().unwrap().plain_text(), "ping");
    }

    #[test]
    fn test_clones_share_payload() {
        let event = Event::from_value(json!({"message_type": "group", "group_id": 1})).unwrap();
        let copy = event.clone();
        assert!(std::ptr::eq(event.raw(), copy.raw()));
    }

    #[test]
    fn test_kind_deserializes_short_aliases() {
        let kinds: Vec<EventKind> =
            serde_json::from_value(json!(["group", "private", "meta_event", "notice"])).unwrap();
        assert_eq!(
            kinds,
            vec![
                EventKind::GroupMessage,
                EventKind::PrivateMessage,
                EventKind::Meta,
                EventKind::Notice
            ]
        );
    }
}
