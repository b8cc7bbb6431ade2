//! Connection-facing types shared between the transport and the framework.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{TransportError, TransportResult};

// =============================================================================
// Frame Handler
// =============================================================================

/// Receives the lifecycle and inbound frames of a connection.
///
/// `on_frame` is awaited once per frame, in arrival order; the next frame is
/// not read until it returns.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// Called after the handshake succeeds, with the handle for this connection.
    async fn on_connect(&self, _connection: &ConnectionHandle) {}

    /// Called for every text or binary frame.
    async fn on_frame(&self, connection: &ConnectionHandle, data: &[u8]);

    /// Called when the connection is gone, before any reconnect.
    async fn on_disconnect(&self, _connection: &ConnectionHandle) {}
}

/// Shared frame handler.
pub type BoxedFrameHandler = Arc<dyn FrameHandler>;

// =============================================================================
// Connection Handle
// =============================================================================

/// Send half of one live connection.
///
/// Every reconnect creates a new handle with a new id. Sends through an
/// older handle fail with
/// [`TransportError::ConnectionClosed`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    message_tx: mpsc::Sender<String>,
}

impl ConnectionHandle {
    /// Wraps the outbound queue of a connection.
    pub fn new(id: u64, message_tx: mpsc::Sender<String>) -> Self {
        Self { id, message_tx }
    }

    /// Creates a detached handle together with its receiving end.
    ///
    /// Useful for tests and for driving handlers without a socket.
    pub fn channel(id: u64, buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(id, tx), rx)
    }

    /// The connection id, unique per process.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns `true` once the connection behind this handle is gone.
    pub fn is_closed(&self) -> bool {
        self.message_tx.is_closed()
    }

    /// Queues a text frame.
    pub async fn send(&self, frame: String) -> TransportResult<()> {
        self.message_tx
            .send(frame)
            .await
            .map_err(|_| TransportError::ConnectionClosed {
                reason: format!("connection #{} is no longer active", self.id),
            })
    }

    /// Serializes `value` and queues it.
    pub async fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> TransportResult<()> {
        let frame = serde_json::to_string(value)
            .map_err(|e| TransportError::SendFailed(format!("serialization failed: {e}")))?;
        self.send(frame).await
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Settings of the WebSocket client connection.
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// Endpoint, `ws://` or `wss://`.
    pub url: String,
    /// Sent as `Authorization: Bearer <token>` when set.
    pub access_token: Option<String>,
    /// Fixed delay between a failure and the next attempt.
    pub reconnect_delay: Duration,
    /// Capacity of the outbound frame queue.
    pub outbound_capacity: usize,
}

impl WsClientConfig {
    pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);
    pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: None,
            reconnect_delay: Self::DEFAULT_RECONNECT_DELAY,
            outbound_capacity: Self::DEFAULT_OUTBOUND_CAPACITY,
        }
    }

    /// Sets the bearer token. Empty tokens are ignored.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token = (!token.is_empty()).then_some(token);
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }
}
