//! Ordered segment list.
//!
//! [`Message`] is the payload the outbound builder accumulates and the type
//! inbound `message` fields decode into. It always serializes in array form;
//! a legacy plain-string `message` decodes into a single text segment.
//!
//! ```rust,ignore
//! let msg = Message::new()
//!     .reply(42)
//!     .at(10001)
//!     .text(" pong");
//! assert_eq!(msg.len(), 3);
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::segment::Segment;

/// A message composed of segments, in send order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    segments: Vec<Segment>,
}

// ============================================================================
// Serialization / Deserialization
// ============================================================================

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.segments.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum MessageFormat {
            Array(Vec<Segment>),
            String(String),
        }

        match MessageFormat::deserialize(deserializer)? {
            MessageFormat::Array(segments) => Ok(Message { segments }),
            MessageFormat::String(text) => Ok(Message::new().text(text)),
        }
    }
}

// ============================================================================
// Constructors and Builders
// ============================================================================

impl Message {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Concatenates the text segments, ignoring everything else.
    pub fn plain_text(&self) -> String {
        self.segments.iter().filter_map(Segment::as_text).collect()
    }

    /// Appends an arbitrary segment.
    pub fn segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    // --------------------------------
    // Text & mentions
    // --------------------------------

    pub fn text(self, text: impl Into<String>) -> Self {
        self.segment(Segment::text(text))
    }

    pub fn at(self, user_id: i64) -> Self {
        self.segment(Segment::at(user_id))
    }

    pub fn at_all(self) -> Self {
        self.segment(Segment::at_all())
    }

    pub fn reply(self, message_id: i64) -> Self {
        self.segment(Segment::reply(message_id))
    }

    pub fn face(self, id: i32) -> Self {
        self.segment(Segment::face(id))
    }

    // --------------------------------
    // Media
    // --------------------------------

    pub fn image(self, file: impl Into<String>) -> Self {
        self.segment(Segment::image(file))
    }

    pub fn image_url(self, file: impl Into<String>, url: impl Into<String>) -> Self {
        self.segment(Segment::image_with_url(file, url))
    }

    pub fn voice(self, file: impl Into<String>, url: Option<String>) -> Self {
        self.segment(Segment::record(file, url))
    }

    pub fn video(self, file: impl Into<String>, url: Option<String>) -> Self {
        self.segment(Segment::video(file, url))
    }

    // --------------------------------
    // Cards & magic emoji
    // --------------------------------

    pub fn json(self, data: &serde_json::Value) -> Self {
        self.segment(Segment::json(data))
    }

    pub fn music(self, platform: impl Into<String>, id: impl Into<String>) -> Self {
        self.segment(Segment::music(platform, id))
    }

    pub fn custom_music(
        self,
        url: impl Into<String>,
        audio: impl Into<String>,
        title: impl Into<String>,
        singer: impl Into<String>,
        image: Option<String>,
    ) -> Self {
        self.segment(Segment::custom_music(url, audio, title, singer, image))
    }

    pub fn dice(self) -> Self {
        self.segment(Segment::dice())
    }

    pub fn rps(self) -> Self {
        self.segment(Segment::rps())
    }

    pub fn poke(self, poke_type: impl Into<String>, id: impl Into<String>) -> Self {
        self.segment(Segment::poke(poke_type, id))
    }
}

impl From<Vec<Segment>> for Message {
    fn from(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::new().text(text)
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::new().text(text)
    }
}

impl IntoIterator for Message {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_preserves_order() {
        let msg = Message::new().reply(7).at(100).text(" hi").dice();
        let kinds: Vec<_> = msg.segments().iter().map(Segment::kind).collect();
        assert_eq!(kinds, ["reply", "at", "text", "dice"]);
    }

    #[test]
    fn test_serializes_as_array() {
        let value = serde_json::to_value(Message::from("hello")).unwrap();
        assert_eq!(value, json!([{"type": "text", "data": {"text": "hello"}}]));
    }

    #[test]
    fn test_deserializes_legacy_string() {
        let msg: Message = serde_json::from_value(json!("plain")).unwrap();
        assert_eq!(msg.plain_text(), "plain");
    }

    #[test]
    fn test_plain_text_skips_non_text() {
        let msg = Message::new().text("a").at(1).text("b").image("x.png");
        assert_eq!(msg.plain_text(), "ab");
    }
}
