//! # napgate core
//!
//! Building blocks shared by every napgate crate:
//!
//! - **Event envelope**: [`Event`] and [`EventKind`], the decoded view of an inbound frame
//! - **Outbound builder**: [`Segment`], [`Message`], [`Action`] and the send-capable [`Client`]
//! - **Transport types**: [`ConnectionHandle`], [`FrameHandler`], [`WsClientConfig`]
//! - **Handler catalog**: [`PluginEntry`] and the link-time [`PLUGIN_REGISTRY`]
//!
//! ```text
//! frame ──▶ Event ──▶ handler(Event, Client) ──▶ MessageBuilder ──▶ Action ──▶ frame
//! ```

pub mod action;
pub mod client;
pub mod error;
pub mod event;
pub mod message;
pub mod pacing;
pub mod plugin;
pub mod segment;
pub mod transport;

pub use action::{Action, ForwardOptions};
pub use client::{Client, MessageBuilder, MessageSender, Target, TargetRef};
pub use error::{
    EventError, EventResult, SendError, SendResult, TransportError, TransportResult,
};
pub use event::{Event, EventKind};
pub use message::Message;
pub use pacing::Pacer;
pub use plugin::{
    BoxError, HandlerFn, HandlerResult, IntoHandlerResult, PLUGIN_REGISTRY, ParamShape,
    PluginEntry,
};
pub use segment::Segment;
pub use transport::{BoxedFrameHandler, ConnectionHandle, FrameHandler, WsClientConfig};

// Used by code generated from `#[plugin]`.
#[doc(hidden)]
pub use futures;
#[doc(hidden)]
pub use linkme;
#[doc(hidden)]
pub use serde_json;
