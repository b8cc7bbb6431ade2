//! # napgate
//!
//! A client-side gateway for OneBot v11 backends such as NapCat. It keeps a
//! WebSocket connection to the backend alive, decodes every inbound frame
//! into an [`Event`](prelude::Event) and fans it out to the handlers enabled
//! by the plugin manifests found on disk.
//!
//! ```text
//! ┌──────────────┐  frame   ┌───────────┐  Event   ┌────────────┐
//! │  Connection  │────────▶│  Gateway  │────────▶│ Dispatcher │──▶ handler(Event, Client)
//! │   Manager    │◀────────│  Handler  │          └────────────┘          │
//! └──────────────┘  Action  └───────────┘                ▲                │
//!                                                        │ snapshot       │ MessageBuilder
//!   *.plugin.toml ──▶ Discovery ──▶ PluginRegistry ──────┘                ▼
//!          ▲                                                           Client::send
//!          └── PluginWatcher (hot reload)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use napgate::prelude::*;
//!
//! #[plugin]
//! async fn ping(event: Event, client: Client) -> Result<(), SendError> {
//!     if event.raw_text() == "ping" {
//!         client.reply(&event, "pong").await?;
//!     }
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     Gateway::from_config(config).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! With `plugins/ping.plugin.toml` next to the binary (an empty file is
//! enough), the handler above is loaded when the gateway starts and
//! reloaded whenever the manifest changes.
//!
//! ## Features
//!
//! - `file-watcher`: Reload plugins when manifests change (default)
//! - `json-log`: JSON log output

// Lets `#[plugin]` expand inside this crate's own tests and docs.
extern crate self as napgate;

pub use napgate_core as core;
pub use napgate_framework as framework;
pub use napgate_runtime as runtime;
pub use napgate_transport as transport;

pub use napgate_macros::plugin;

/// Everything a plugin module or a gateway binary usually needs.
///
/// ```rust,ignore
/// use napgate::prelude::*;
/// ```
pub mod prelude {
    pub use napgate_macros::plugin;

    // Inbound
    pub use napgate_core::{Event, EventKind};

    // Outbound
    pub use napgate_core::{
        Action, Client, ForwardOptions, Message, MessageBuilder, SendError, SendResult, Segment,
        Target,
    };

    // Handler results
    pub use napgate_core::{BoxError, HandlerResult};

    // Gateway
    pub use napgate_runtime::{ConfigLoader, Gateway, GatewayConfig, RuntimeError};

    pub use napgate_runtime::prelude::*;
}

#[doc(hidden)]
pub mod __private {
    pub use napgate_core::futures;
    pub use napgate_core::linkme;
    pub use napgate_core::{Client, Event, IntoHandlerResult, PLUGIN_REGISTRY, ParamShape, PluginEntry};
}
