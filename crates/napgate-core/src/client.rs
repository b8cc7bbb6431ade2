//! Send capability handed to every handler invocation.
//!
//! A [`Client`] is bound to the connection that delivered the event. Message
//! sends go through the fluent [`MessageBuilder`]:
//!
//! ```rust,ignore
//! client
//!     .send_msg()
//!     .all(&event)?
//!     .reply(event.message_id().unwrap_or_default())
//!     .text("pong")
//!     .send()
//!     .await?;
//! ```
//!
//! Other catalog actions are sent with [`Client::call`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::action::Action;
use crate::error::{SendError, SendResult};
use crate::event::Event;
use crate::message::Message;
use crate::pacing::Pacer;
use crate::segment::Segment;
use crate::transport::ConnectionHandle;

// =============================================================================
// Client
// =============================================================================

/// Handle through which handlers talk back to the backend.
#[derive(Debug, Clone)]
pub struct Client {
    connection: ConnectionHandle,
    pacer: Arc<Pacer>,
}

impl Client {
    pub fn new(connection: ConnectionHandle, pacer: Arc<Pacer>) -> Self {
        Self { connection, pacer }
    }

    /// The connection this client writes to.
    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Starts a message send.
    pub fn send_msg(&self) -> MessageSender {
        MessageSender {
            client: self.clone(),
        }
    }

    /// Sends an arbitrary action, honoring the send spacing.
    pub async fn call(&self, action: &Action) -> SendResult<()> {
        self.pacer.ready().await;
        self.connection.send_json(action).await?;
        debug!(action = %action.action, connection = self.connection.id(), "Action sent");
        Ok(())
    }

    /// Replies to `event` in its own conversation, quoting it when possible.
    pub async fn reply(&self, event: &Event, text: impl Into<String>) -> SendResult<()> {
        let mut builder = self.send_msg().all(event)?;
        if let Some(id) = event.message_id() {
            builder = builder.reply(id);
        }
        builder.text(text).send().await
    }

    /// Pokes the sender of `event`, in the group when it came from one.
    pub async fn poke_sender(&self, event: &Event) -> SendResult<()> {
        let user_id = event
            .sender_id()
            .ok_or(SendError::MissingTarget { field: "user_id" })?;
        let action = match event.group_id() {
            Some(group_id) => Action::send_group_poke(group_id, user_id),
            None => Action::send_private_poke(user_id),
        };
        self.call(&action).await
    }
}

// =============================================================================
// Target Selection
// =============================================================================

/// Where a message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Group(i64),
    Private(i64),
}

impl Target {
    fn label(&self) -> &'static str {
        match self {
            Target::Group(_) => "group",
            Target::Private(_) => "private",
        }
    }

    fn id(&self) -> i64 {
        match self {
            Target::Group(id) | Target::Private(id) => *id,
        }
    }
}

/// An explicit id or an event to take the id from.
#[derive(Debug, Clone, Copy)]
pub enum TargetRef<'a> {
    Id(i64),
    Event(&'a Event),
}

impl From<i64> for TargetRef<'_> {
    fn from(id: i64) -> Self {
        TargetRef::Id(id)
    }
}

impl<'a> From<&'a Event> for TargetRef<'a> {
    fn from(event: &'a Event) -> Self {
        TargetRef::Event(event)
    }
}

/// First step of a message send: picks the target.
#[derive(Debug, Clone)]
pub struct MessageSender {
    client: Client,
}

impl MessageSender {
    /// Targets a group. Fails on a private-message event.
    pub fn group<'a>(self, target: impl Into<TargetRef<'a>>) -> SendResult<MessageBuilder> {
        let group_id = match target.into() {
            TargetRef::Id(id) => id,
            TargetRef::Event(event) if event.is_private() => {
                return Err(SendError::InvalidTargetType {
                    expected: "group",
                    got: "private",
                });
            }
            TargetRef::Event(event) => event
                .group_id()
                .ok_or(SendError::MissingTarget { field: "group_id" })?,
        };
        Ok(self.into_builder(Target::Group(group_id)))
    }

    /// Targets a user. Fails on a group-message event.
    pub fn private<'a>(self, target: impl Into<TargetRef<'a>>) -> SendResult<MessageBuilder> {
        let user_id = match target.into() {
            TargetRef::Id(id) => id,
            TargetRef::Event(event) if event.is_group() => {
                return Err(SendError::InvalidTargetType {
                    expected: "private",
                    got: "group",
                });
            }
            TargetRef::Event(event) => event
                .user_id()
                .ok_or(SendError::MissingTarget { field: "user_id" })?,
        };
        Ok(self.into_builder(Target::Private(user_id)))
    }

    /// Answers in the conversation the event came from.
    pub fn all(self, event: &Event) -> SendResult<MessageBuilder> {
        let target = if event.is_group() {
            event.group_id().map(Target::Group)
        } else if event.is_private() {
            event.user_id().map(Target::Private)
        } else {
            event
                .group_id()
                .map(Target::Group)
                .or_else(|| event.user_id().map(Target::Private))
        };

        let target = target.ok_or(SendError::MissingTarget {
            field: if event.is_private() { "user_id" } else { "group_id" },
        })?;
        Ok(self.into_builder(target))
    }

    /// Targets an already resolved destination.
    pub fn to(self, target: Target) -> MessageBuilder {
        self.into_builder(target)
    }

    fn into_builder(self, target: Target) -> MessageBuilder {
        MessageBuilder {
            client: self.client,
            target,
            message: Message::new(),
        }
    }
}

// =============================================================================
// Message Builder
// =============================================================================

/// Accumulates segments for one outbound message.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    client: Client,
    target: Target,
    message: Message,
}

impl MessageBuilder {
    pub fn target(&self) -> Target {
        self.target
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    fn push(mut self, segment: Segment) -> Self {
        self.message.push(segment);
        self
    }

    // --------------------------------
    // Segments
    // --------------------------------

    pub fn text(self, text: impl Into<String>) -> Self {
        self.push(Segment::text(text))
    }

    pub fn at(self, user_id: i64) -> Self {
        self.push(Segment::at(user_id))
    }

    pub fn at_all(self) -> Self {
        self.push(Segment::at_all())
    }

    pub fn image(self, file: impl Into<String>) -> Self {
        self.push(Segment::image(file))
    }

    pub fn image_url(self, file: impl Into<String>, url: impl Into<String>) -> Self {
        self.push(Segment::image_with_url(file, url))
    }

    pub fn voice(self, file: impl Into<String>) -> Self {
        self.push(Segment::record(file, None))
    }

    pub fn video(self, file: impl Into<String>) -> Self {
        self.push(Segment::video(file, None))
    }

    pub fn face(self, id: i32) -> Self {
        self.push(Segment::face(id))
    }

    pub fn reply(self, message_id: i64) -> Self {
        self.push(Segment::reply(message_id))
    }

    pub fn json(self, data: &serde_json::Value) -> Self {
        self.push(Segment::json(data))
    }

    pub fn music(self, platform: impl Into<String>, id: impl Into<String>) -> Self {
        self.push(Segment::music(platform, id))
    }

    pub fn custom_music(
        self,
        url: impl Into<String>,
        audio: impl Into<String>,
        title: impl Into<String>,
        singer: impl Into<String>,
        image: Option<String>,
    ) -> Self {
        self.push(Segment::custom_music(url, audio, title, singer, image))
    }

    pub fn dice(self) -> Self {
        self.push(Segment::dice())
    }

    pub fn rps(self) -> Self {
        self.push(Segment::rps())
    }

    pub fn poke(self, poke_type: impl Into<String>, id: impl Into<String>) -> Self {
        self.push(Segment::poke(poke_type, id))
    }

    /// Appends a prebuilt segment.
    pub fn segment(self, segment: Segment) -> Self {
        self.push(segment)
    }

    /// Appends every segment of `message`.
    pub fn extend(mut self, message: Message) -> Self {
        for segment in message {
            self.message.push(segment);
        }
        self
    }

    // --------------------------------
    // Terminal operations
    // --------------------------------

    /// Returns the action frame without sending it.
    pub fn build(&self) -> Action {
        match self.target {
            Target::Group(id) => Action::send_group_msg(id, self.message.clone()),
            Target::Private(id) => Action::send_private_msg(id, self.message.clone()),
        }
    }

    /// Sends the message.
    pub async fn send(self) -> SendResult<()> {
        let action = self.build();
        self.client.call(&action).await?;
        info!(
            target_type = self.target.label(),
            target_id = self.target.id(),
            segments = self.message.len(),
            "Message sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use serde_json::{Value, json};

    fn client() -> (Client, tokio::sync::mpsc::Receiver<String>) {
        let (handle, rx) = ConnectionHandle::channel(1, 16);
        (Client::new(handle, Arc::new(Pacer::unlimited())), rx)
    }

    fn group_event() -> Event {
        Event::from_value(json!({
            "message_type": "group",
            "group_id": 100,
            "user_id": 7,
            "message_id": 55
        }))
        .unwrap()
    }

    fn private_event() -> Event {
        Event::from_value(json!({"message_type": "private", "user_id": 7})).unwrap()
    }

    #[tokio::test]
    async fn test_group_send_produces_action() {
        let (client, mut rx) = client();
        client
            .send_msg()
            .group(100_i64)
            .unwrap()
            .text("hello")
            .at(200)
            .send()
            .await
            .unwrap();

        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(
            frame,
            json!({
                "action": "send_group_msg",
                "params": {
                    "group_id": 100,
                    "message": [
                        {"type": "text", "data": {"text": "hello"}},
                        {"type": "at", "data": {"qq": "200"}}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_target_type_mismatch() {
        let (client, _rx) = client();

        let err = client.send_msg().group(&private_event()).unwrap_err();
        assert!(matches!(
            err,
            SendError::InvalidTargetType {
                expected: "group",
                got: "private"
            }
        ));

        let err = client.send_msg().private(&group_event()).unwrap_err();
        assert!(matches!(err, SendError::InvalidTargetType { expected: "private", .. }));
    }

    #[test]
    fn test_all_detects_target() {
        let (client, _rx) = client();
        assert_eq!(
            client.send_msg().all(&group_event()).unwrap().target(),
            Target::Group(100)
        );
        assert_eq!(
            client.send_msg().all(&private_event()).unwrap().target(),
            Target::Private(7)
        );

        let meta = Event::from_value(json!({"post_type": "meta_event"})).unwrap();
        assert!(matches!(
            client.send_msg().all(&meta),
            Err(SendError::MissingTarget { .. })
        ));
    }

    #[test]
    fn test_build_without_sending() {
        let (client, mut rx) = client();
        let action = client
            .send_msg()
            .private(9_i64)
            .unwrap()
            .dice()
            .json(&json!({"k": "v"}))
            .build();

        assert_eq!(action.action, "send_private_msg");
        assert_eq!(action.params["user_id"], 9);
        assert_eq!(action.params["message"][1]["data"]["data"], r#"{"k":"v"}"#);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reply_quotes_message() {
        let (client, mut rx) = client();
        client.reply(&group_event(), "pong").await.unwrap();

        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["params"]["message"][0], json!({"type": "reply", "data": {"id": "55"}}));
        assert_eq!(frame["params"]["message"][1]["data"]["text"], "pong");
    }

    #[tokio::test]
    async fn test_send_on_stale_connection_fails() {
        let (client, rx) = client();
        drop(rx);

        let err = client
            .send_msg()
            .group(1_i64)
            .unwrap()
            .text("x")
            .send()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SendError::Transport(TransportError::ConnectionClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_poke_sender_in_group() {
        let (client, mut rx) = client();
        client.poke_sender(&group_event()).await.unwrap();

        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["action"], "send_group_poke");
        assert_eq!(frame["params"], json!({"group_id": 100, "user_id": 7}));
    }
}
