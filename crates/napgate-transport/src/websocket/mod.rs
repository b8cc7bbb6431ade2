//! WebSocket client transport.

mod client;

pub use client::{ConnectionManager, ConnectionState};
