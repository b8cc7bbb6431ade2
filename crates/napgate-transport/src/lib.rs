//! # napgate transport
//!
//! Keeps the gateway attached to its backend.
//!
//! ```text
//! ┌───────────────────┐  inbound frames  ┌──────────────┐
//! │ ConnectionManager │─────────────────▶│ FrameHandler │
//! │ (connect, retry)  │◀─────────────────│  (dispatch)  │
//! └───────────────────┘ ConnectionHandle └──────────────┘
//! ```
//!
//! The [`ConnectionManager`] owns the socket. It reconnects after any
//! transient failure with a fixed delay and gives up only on a malformed
//! target or a rejected handshake.

pub mod websocket;

pub use websocket::{ConnectionManager, ConnectionState};
