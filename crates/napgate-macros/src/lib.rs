//! Procedural macros for napgate.
//!
//! - `#[plugin]` - registers an async handler function in the link-time catalog
//!
//! # Handler shapes
//!
//! A handler takes the event and a [`Client`]. The event parameter decides
//! what is passed in:
//!
//! ```rust,ignore
//! use napgate::prelude::*;
//!
//! // Wrapped: typed accessors over the payload.
//! #[plugin]
//! async fn ping(event: Event, client: Client) -> Result<(), SendError> {
//!     if event.raw_text() == "ping" {
//!         client.reply(&event, "pong").await?;
//!     }
//!     Ok(())
//! }
//!
//! // Raw: the untyped JSON payload.
//! #[plugin(name = "audit")]
//! async fn audit(payload: serde_json::Value, _client: Client) {
//!     tracing::debug!(%payload, "frame");
//! }
//! ```
//!
//! The generated code refers to `::napgate::__private`, so the macro is meant
//! to be used through the `napgate` facade crate.

mod plugin;

use proc_macro::TokenStream;

/// Registers an async handler function.
///
/// # Attributes
///
/// - `#[plugin(name = "...")]` - Override the handler name (defaults to the function name)
///
/// Handlers may return `()` or `Result<(), E>` where `E` converts into a boxed error.
#[proc_macro_attribute]
pub fn plugin(attr: TokenStream, item: TokenStream) -> TokenStream {
    match plugin::expand(attr.into(), item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
