//! OneBot v11 message segments.
//!
//! A message is an ordered list of segments; each serializes as
//! `{"type": "<kind>", "data": {...}}`. The set here covers what the
//! outbound builder emits and what commonly arrives inbound; unknown inbound
//! segments are still available through [`Event::raw`](crate::Event::raw).

use serde::{Deserialize, Serialize};

// ============================================================================
// Segment Enum
// ============================================================================

/// A single message segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text.
    Text(TextData),
    /// Built-in face/emoji.
    Face(FaceData),
    /// Image.
    Image(ImageData),
    /// Voice clip.
    Record(MediaData),
    /// Video.
    Video(MediaData),
    /// Mention.
    At(AtData),
    /// Rock-paper-scissors magic emoji.
    Rps(EmptyData),
    /// Dice magic emoji.
    Dice(EmptyData),
    /// Poke.
    Poke(PokeData),
    /// Music card, platform or custom.
    Music(MusicData),
    /// Reply to a message.
    Reply(ReplyData),
    /// Forward reference (inbound only).
    Forward(ForwardData),
    /// Forward node, used to build merged forwards.
    Node(NodeData),
    /// Raw JSON card.
    Json(JsonData),
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Text(data) => write!(f, "{}", data.text),
            Segment::Face(data) => write!(f, "[face:{}]", data.id),
            Segment::Image(data) => write!(f, "[image:{}]", data.file),
            Segment::Record(data) => write!(f, "[voice:{}]", data.file),
            Segment::Video(data) => write!(f, "[video:{}]", data.file),
            Segment::At(data) if data.qq == "all" => write!(f, "@all"),
            Segment::At(data) => write!(f, "@{}", data.qq),
            Segment::Rps(_) => write!(f, "[rps]"),
            Segment::Dice(_) => write!(f, "[dice]"),
            Segment::Poke(data) => write!(f, "[poke:{}]", data.poke_type),
            Segment::Music(data) => write!(f, "[music:{}]", data.music_type),
            Segment::Reply(data) => write!(f, "[reply:{}]", data.id),
            Segment::Forward(data) => write!(f, "[forward:{}]", data.id),
            Segment::Node(_) => write!(f, "[node]"),
            Segment::Json(_) => write!(f, "[json]"),
        }
    }
}

// ============================================================================
// Segment Builder Methods
// ============================================================================

impl Segment {
    /// Returns the wire name of this segment.
    pub fn kind(&self) -> &'static str {
        match self {
            Segment::Text(_) => "text",
            Segment::Face(_) => "face",
            Segment::Image(_) => "image",
            Segment::Record(_) => "record",
            Segment::Video(_) => "video",
            Segment::At(_) => "at",
            Segment::Rps(_) => "rps",
            Segment::Dice(_) => "dice",
            Segment::Poke(_) => "poke",
            Segment::Music(_) => "music",
            Segment::Reply(_) => "reply",
            Segment::Forward(_) => "forward",
            Segment::Node(_) => "node",
            Segment::Json(_) => "json",
        }
    }

    /// Returns the text content of a text segment.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Segment::Text(data) => Some(&data.text),
            _ => None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text(TextData { text: text.into() })
    }

    pub fn face(id: i32) -> Self {
        Segment::Face(FaceData { id: id.to_string() })
    }

    /// Image from a file path, URL or `base64://` payload.
    pub fn image(file: impl Into<String>) -> Self {
        Segment::Image(ImageData {
            file: file.into(),
            url: None,
            summary: None,
        })
    }

    /// Image with an explicit download URL next to the file name.
    pub fn image_with_url(file: impl Into<String>, url: impl Into<String>) -> Self {
        Segment::Image(ImageData {
            file: file.into(),
            url: Some(url.into()),
            summary: None,
        })
    }

    pub fn record(file: impl Into<String>, url: Option<String>) -> Self {
        Segment::Record(MediaData {
            file: file.into(),
            url,
        })
    }

    pub fn video(file: impl Into<String>, url: Option<String>) -> Self {
        Segment::Video(MediaData {
            file: file.into(),
            url,
        })
    }

    /// Mentions a user. The id is sent as a string.
    pub fn at(user_id: i64) -> Self {
        Segment::At(AtData {
            qq: user_id.to_string(),
        })
    }

    /// Mentions everyone in the group.
    pub fn at_all() -> Self {
        Segment::At(AtData {
            qq: "all".to_string(),
        })
    }

    pub fn rps() -> Self {
        Segment::Rps(EmptyData {})
    }

    pub fn dice() -> Self {
        Segment::Dice(EmptyData {})
    }

    pub fn poke(poke_type: impl Into<String>, id: impl Into<String>) -> Self {
        Segment::Poke(PokeData {
            poke_type: poke_type.into(),
            id: id.into(),
        })
    }

    pub fn reply(message_id: i64) -> Self {
        Segment::Reply(ReplyData {
            id: message_id.to_string(),
        })
    }

    /// A JSON card. The value is sent as its serialized string form.
    pub fn json(data: &serde_json::Value) -> Self {
        Segment::Json(JsonData {
            data: data.to_string(),
        })
    }

    /// A platform music card (`qq`, `163`, `kugou`, ...).
    pub fn music(platform: impl Into<String>, id: impl Into<String>) -> Self {
        Segment::Music(MusicData {
            music_type: platform.into(),
            id: Some(id.into()),
            ..MusicData::default()
        })
    }

    /// A custom music card pointing at arbitrary audio.
    pub fn custom_music(
        url: impl Into<String>,
        audio: impl Into<String>,
        title: impl Into<String>,
        singer: impl Into<String>,
        image: Option<String>,
    ) -> Self {
        Segment::Music(MusicData {
            music_type: "custom".to_string(),
            id: None,
            url: Some(url.into()),
            audio: Some(audio.into()),
            title: Some(title.into()),
            singer: Some(singer.into()),
            image,
        })
    }

    /// A forward node referencing an existing message.
    pub fn node_ref(message_id: i64) -> Self {
        Segment::Node(NodeData {
            id: Some(message_id.to_string()),
            ..NodeData::default()
        })
    }

    /// A custom forward node with its own sender and content.
    pub fn node(user_id: i64, nickname: impl Into<String>, content: Vec<Segment>) -> Self {
        Segment::Node(NodeData {
            id: None,
            user_id: Some(user_id.to_string()),
            nickname: Some(nickname.into()),
            content: Some(content),
        })
    }
}

// ============================================================================
// Segment Data Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceData {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Payload shared by voice and video segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaData {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtData {
    /// User id as a string, or `"all"`.
    pub qq: String,
}

/// Payload of segments that carry no data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmptyData {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokeData {
    #[serde(rename = "type")]
    pub poke_type: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MusicData {
    /// Platform name, or `"custom"`.
    #[serde(rename = "type")]
    pub music_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyData {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardData {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<Segment>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonData {
    /// The card as a serialized JSON string.
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_at_serializes_id_as_string() {
        let value = serde_json::to_value(Segment::at(10001)).unwrap();
        assert_eq!(value, json!({"type": "at", "data": {"qq": "10001"}}));
    }

    #[test]
    fn test_image_omits_missing_url() {
        let value = serde_json::to_value(Segment::image("a.png")).unwrap();
        assert_eq!(value, json!({"type": "image", "data": {"file": "a.png"}}));

        let value = serde_json::to_value(Segment::image_with_url("a.png", "http://x/a.png")).unwrap();
        assert_eq!(value["data"]["url"], "http://x/a.png");
    }

    #[test]
    fn test_json_card_is_stringified() {
        let card = json!({"app": "com.example", "ver": 1});
        let value = serde_json::to_value(Segment::json(&card)).unwrap();
        let data = value["data"]["data"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(data).unwrap(), card);
    }

    #[test]
    fn test_custom_music_fields() {
        let value = serde_json::to_value(Segment::custom_music(
            "https://jump",
            "https://audio.mp3",
            "Title",
            "Singer",
            None,
        ))
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "music", "data": {
                "type": "custom",
                "url": "https://jump",
                "audio": "https://audio.mp3",
                "title": "Title",
                "singer": "Singer"
            }})
        );
    }

    #[test]
    fn test_parses_inbound_segments() {
        let segments: Vec<Segment> = serde_json::from_value(json!([
            {"type": "reply", "data": {"id": "99"}},
            {"type": "text", "data": {"text": "hi"}},
            {"type": "dice", "data": {}}
        ]))
        .unwrap();

        assert_eq!(segments[0], Segment::reply(99));
        assert_eq!(segments[1].as_text(), Some("hi"));
        assert_eq!(segments[2].kind(), "dice");
    }

    #[test]
    fn test_display() {
        assert_eq!(Segment::at_all().to_string(), "@all");
        assert_eq!(Segment::face(14).to_string(), "[face:14]");
    }
}
