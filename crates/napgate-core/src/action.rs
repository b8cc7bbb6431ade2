//! Outbound action frames.
//!
//! Every request sent to the backend is an [`Action`]:
//! `{"action": "<name>", "params": {...}}`. The constructors below cover the
//! subset of the NapCat catalog the gateway exposes; anything else can be
//! built with [`Action::new`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::message::Message;

/// A single action request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action name, e.g. `send_group_msg`.
    pub action: String,
    /// Action parameters.
    pub params: Value,
    /// Optional correlation token echoed back in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo: Option<String>,
}

/// Presentation metadata of a merged forward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardOptions {
    /// Title line.
    pub source: Option<String>,
    /// Preview lines under the title.
    pub news: Vec<String>,
    /// Text shown in the conversation list.
    pub prompt: Option<String>,
    /// Footer summary.
    pub summary: Option<String>,
}

impl ForwardOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn news(mut self, line: impl Into<String>) -> Self {
        self.news.push(line.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    fn apply(self, params: &mut Map<String, Value>) {
        if let Some(source) = self.source.filter(|s| !s.is_empty()) {
            params.insert("source".into(), source.into());
        }
        if !self.news.is_empty() {
            let news: Vec<Value> = self.news.into_iter().map(|text| json!({ "text": text })).collect();
            params.insert("news".into(), Value::Array(news));
        }
        if let Some(prompt) = self.prompt.filter(|s| !s.is_empty()) {
            params.insert("prompt".into(), prompt.into());
        }
        if let Some(summary) = self.summary.filter(|s| !s.is_empty()) {
            params.insert("summary".into(), summary.into());
        }
    }
}

impl Action {
    /// Creates an arbitrary action.
    pub fn new(action: impl Into<String>, params: Value) -> Self {
        Self {
            action: action.into(),
            params,
            echo: None,
        }
    }

    /// Attaches a correlation token.
    pub fn with_echo(mut self, echo: impl Into<String>) -> Self {
        self.echo = Some(echo.into());
        self
    }

    /// Serializes the frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    // --------------------------------
    // Messages
    // --------------------------------

    pub fn send_group_msg(group_id: i64, message: Message) -> Self {
        Self::new(
            "send_group_msg",
            json!({ "group_id": group_id, "message": message }),
        )
    }

    pub fn send_private_msg(user_id: i64, message: Message) -> Self {
        Self::new(
            "send_private_msg",
            json!({ "user_id": user_id, "message": message }),
        )
    }

    /// Merged forward into a group. `nodes` are `node` segments.
    pub fn send_group_forward_msg(group_id: i64, nodes: Message, options: ForwardOptions) -> Self {
        let mut params = Map::new();
        params.insert("group_id".into(), group_id.into());
        params.insert("messages".into(), json!(nodes));
        options.apply(&mut params);
        Self::new("send_group_forward_msg", Value::Object(params))
    }

    pub fn send_private_forward_msg(user_id: i64, nodes: Message, options: ForwardOptions) -> Self {
        let mut params = Map::new();
        params.insert("user_id".into(), user_id.into());
        params.insert("messages".into(), json!(nodes));
        options.apply(&mut params);
        Self::new("send_private_forward_msg", Value::Object(params))
    }

    /// Merged forward with no explicit target; the backend returns its id.
    pub fn send_forward_msg(nodes: Message) -> Self {
        Self::new("send_forward_msg", json!({ "messages": nodes }))
    }

    pub fn forward_msg_to_group(group_id: i64, message_id: i64) -> Self {
        Self::new(
            "forward_msg_to_group",
            json!({ "group_id": group_id, "message_id": message_id }),
        )
    }

    pub fn forward_msg_to_private(user_id: i64, message_id: i64) -> Self {
        Self::new(
            "forward_msg_to_private",
            json!({ "user_id": user_id, "message_id": message_id }),
        )
    }

    pub fn delete_msg(message_id: i64) -> Self {
        Self::new("delete_msg", json!({ "message_id": message_id }))
    }

    pub fn get_msg(message_id: i64) -> Self {
        Self::new("get_msg", json!({ "message_id": message_id }))
    }

    pub fn get_forward_msg(message_id: i64) -> Self {
        Self::new("get_forward_msg", json!({ "message_id": message_id }))
    }

    pub fn set_essence_msg(message_id: i64) -> Self {
        Self::new("set_essence_msg", json!({ "message_id": message_id }))
    }

    pub fn get_essence_msg_list(group_id: i64) -> Self {
        Self::new("get_essence_msg_list", json!({ "group_id": group_id }))
    }

    pub fn get_group_history_msg(group_id: i64, message_seq: Option<i64>) -> Self {
        let mut params = json!({ "group_id": group_id });
        if let Some(seq) = message_seq {
            params["message_seq"] = seq.into();
        }
        Self::new("get_group_history_msg", params)
    }

    pub fn get_friend_history_msg(user_id: i64, message_seq: Option<i64>) -> Self {
        let mut params = json!({ "user_id": user_id });
        if let Some(seq) = message_seq {
            params["message_seq"] = seq.into();
        }
        Self::new("get_friend_history_msg", params)
    }

    // --------------------------------
    // Pokes
    // --------------------------------

    pub fn send_group_poke(group_id: i64, user_id: i64) -> Self {
        Self::new(
            "send_group_poke",
            json!({ "group_id": group_id, "user_id": user_id }),
        )
    }

    pub fn send_private_poke(user_id: i64) -> Self {
        Self::new("send_private_poke", json!({ "user_id": user_id }))
    }

    // --------------------------------
    // Files & media
    // --------------------------------

    pub fn send_group_file(group_id: i64, file: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            "send_group_file",
            json!({ "group_id": group_id, "file": file.into(), "name": name.into() }),
        )
    }

    pub fn send_private_file(user_id: i64, file: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            "send_private_file",
            json!({ "user_id": user_id, "file": file.into(), "name": name.into() }),
        )
    }

    pub fn get_record(file: impl Into<String>, out_format: impl Into<String>) -> Self {
        Self::new(
            "get_record",
            json!({ "file": file.into(), "out_format": out_format.into() }),
        )
    }

    pub fn get_image(file: impl Into<String>) -> Self {
        Self::new("get_image", json!({ "file": file.into() }))
    }

    pub fn send_group_ai_voice(group_id: i64, text: impl Into<String>, voice_id: Option<i64>) -> Self {
        let mut params = json!({ "group_id": group_id, "text": text.into() });
        if let Some(voice_id) = voice_id {
            params["voice_id"] = voice_id.into();
        }
        Self::new("send_group_ai_voice", params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;

    #[test]
    fn test_send_group_msg_frame() {
        let action = Action::send_group_msg(123, Message::new().text("hi"));
        let value: Value = serde_json::from_str(&action.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "action": "send_group_msg",
                "params": {
                    "group_id": 123,
                    "message": [{"type": "text", "data": {"text": "hi"}}]
                }
            })
        );
    }

    #[test]
    fn test_forward_options_skip_empty_fields() {
        let nodes = Message::new().segment(Segment::node(10, "bot", vec![Segment::text("a")]));
        let action = Action::send_group_forward_msg(
            5,
            nodes,
            ForwardOptions::new().source("Title").news("line 1").prompt(""),
        );

        assert_eq!(action.params["source"], "Title");
        assert_eq!(action.params["news"], json!([{"text": "line 1"}]));
        assert!(action.params.get("prompt").is_none());
        assert!(action.params.get("summary").is_none());
        assert_eq!(action.params["messages"][0]["type"], "node");
        assert_eq!(action.params["messages"][0]["data"]["user_id"], "10");
    }

    #[test]
    fn test_optional_history_seq() {
        assert!(Action::get_group_history_msg(1, None).params.get("message_seq").is_none());
        assert_eq!(Action::get_friend_history_msg(1, Some(9)).params["message_seq"], 9);
    }

    #[test]
    fn test_echo_is_serialized_only_when_set() {
        let plain = serde_json::to_value(Action::delete_msg(1)).unwrap();
        assert!(plain.get("echo").is_none());

        let tagged = serde_json::to_value(Action::delete_msg(1).with_echo("req-1")).unwrap();
        assert_eq!(tagged["echo"], "req-1");
    }
}
