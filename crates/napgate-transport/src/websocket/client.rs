//! WebSocket client with fixed-delay reconnect.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::{Error, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, debug, error, info, span, trace, warn};

use napgate_core::{
    ConnectionHandle, FrameHandler, TransportError, TransportResult, WsClientConfig,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Upper bound on flushing queued frames once a session ends.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Connection State
// =============================================================================

/// Observable lifecycle of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; either not started yet or waiting to retry.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Frames are flowing.
    Connected,
    /// A non-retryable error ended the manager.
    Fatal,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Why a live session ended.
enum SessionEnd {
    Cancelled,
    Lost,
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Owns the WebSocket connection to the backend.
///
/// [`run`](Self::run) connects, feeds every inbound frame to the handler in
/// arrival order and reconnects after `reconnect_delay` whenever the
/// connection drops or cannot be established. It returns `Ok(())` when the
/// cancellation token fires and `Err` on a fatal error:
///
/// - [`TransportError::InvalidUri`]: the URL or the auth header is malformed
/// - [`TransportError::HandshakeRejected`]: the server refused the upgrade
pub struct ConnectionManager {
    config: WsClientConfig,
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU64,
}

impl ConnectionManager {
    pub fn new(config: WsClientConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            state,
            attempts: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &WsClientConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receives every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Number of connection attempts so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Builds the upgrade request, attaching the bearer token if configured.
    fn build_request(&self) -> TransportResult<Request> {
        let url = &self.config.url;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| classify_error(url, e))?;

        let invalid = |reason: &str| TransportError::InvalidUri {
            url: url.clone(),
            reason: reason.to_string(),
        };
        match request.uri().scheme_str() {
            Some("ws" | "wss") => {}
            Some(_) => return Err(invalid("scheme must be ws or wss")),
            None => return Err(invalid("missing scheme")),
        }
        if request.uri().host().is_none_or(str::is_empty) {
            return Err(invalid("missing host"));
        }

        if let Some(token) = &self.config.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                TransportError::InvalidUri {
                    url: url.clone(),
                    reason: format!("invalid access token: {e}"),
                }
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        Ok(request)
    }

    /// Runs until cancelled or until a fatal error occurs.
    pub async fn run(
        &self,
        handler: Arc<dyn FrameHandler>,
        cancel: CancellationToken,
    ) -> TransportResult<()> {
        let url = self.config.url.clone();
        info!(url = %url, "Starting connection manager");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
            self.set_state(ConnectionState::Connecting);
            debug!(url = %url, attempt, "Connecting to WebSocket server");

            let connected = match self.build_request() {
                Ok(request) => tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = connect_async(request) => result.map_err(|e| classify_error(&url, e)),
                },
                Err(e) => Err(e),
            };

            match connected {
                Ok((stream, _response)) => {
                    let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
                    let session = span!(Level::INFO, "connection", id, url = %url);
                    let end = self
                        .serve(id, stream, handler.as_ref(), &cancel)
                        .instrument(session)
                        .await;
                    if matches!(end, SessionEnd::Cancelled) {
                        break;
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!(url = %url, error = %e, "Connection failed permanently, giving up");
                    self.set_state(ConnectionState::Fatal);
                    return Err(e);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Connection failed");
                }
            }

            self.set_state(ConnectionState::Disconnected);
            warn!(url = %url, delay = ?self.config.reconnect_delay, "Reconnecting...");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!(url = %url, "Connection manager stopped");
        Ok(())
    }

    /// Drives one established connection until it drops or `cancel` fires.
    async fn serve(
        &self,
        id: u64,
        stream: WsStream,
        handler: &dyn FrameHandler,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let (sink, mut source) = stream.split();
        let (message_tx, message_rx) = mpsc::channel::<String>(self.config.outbound_capacity);
        let handle = ConnectionHandle::new(id, message_tx);

        // Not tied to `cancel`: the writer flushes what was accepted first.
        let stop_writer = CancellationToken::new();
        let writer = tokio::spawn(write_loop(sink, message_rx, stop_writer.clone()));

        self.set_state(ConnectionState::Connected);
        info!("WebSocket client connected");
        handler.on_connect(&handle).await;

        let end = loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => break SessionEnd::Cancelled,
                msg = source.next() => msg,
            };

            match msg {
                Some(Ok(Message::Text(text))) => {
                    trace!(len = text.len(), "Received text frame");
                    handler.on_frame(&handle, text.as_bytes()).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    trace!(len = data.len(), "Received binary frame");
                    handler.on_frame(&handle, &data).await;
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    trace!("Received ping/pong");
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "Server closed connection");
                    break SessionEnd::Lost;
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    break SessionEnd::Lost;
                }
                None => {
                    info!("WebSocket stream ended");
                    break SessionEnd::Lost;
                }
            }
        };

        stop_writer.cancel();
        if let Err(e) = writer.await {
            warn!(error = %e, "Writer task failed");
        }
        handler.on_disconnect(&handle).await;
        end
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .finish()
    }
}

/// Drains the outbound queue into the socket until the session ends.
///
/// Once `stop` fires the queue is closed and frames already accepted by
/// [`ConnectionHandle::send`] are still written, bounded by [`FLUSH_TIMEOUT`].
async fn write_loop(mut sink: WsSink, mut rx: mpsc::Receiver<String>, stop: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        warn!(error = %e, "Failed to send message");
                        rx.close();
                        return;
                    }
                }
                None => break,
            },
            _ = stop.cancelled() => break,
        }
    }

    rx.close();
    let flush = async {
        let mut flushed = 0usize;
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame.into())).await {
                warn!(error = %e, "Failed to flush queued message");
                return flushed;
            }
            flushed += 1;
        }
        let _ = sink.close().await;
        flushed
    };
    match tokio::time::timeout(FLUSH_TIMEOUT, flush).await {
        Ok(0) => {}
        Ok(flushed) => debug!(flushed, "Flushed queued messages"),
        Err(_) => warn!(pending = rx.len(), "Timed out flushing queued messages"),
    }
}

/// Maps a tungstenite error onto the transport taxonomy.
fn classify_error(url: &str, err: Error) -> TransportError {
    let url = url.to_string();
    match err {
        Error::Url(e) => TransportError::InvalidUri {
            url,
            reason: e.to_string(),
        },
        Error::HttpFormat(e) => TransportError::InvalidUri {
            url,
            reason: e.to_string(),
        },
        Error::Http(response) => TransportError::HandshakeRejected {
            url,
            reason: format!("HTTP {}", response.status()),
        },
        Error::Protocol(ProtocolError::HandshakeIncomplete) => TransportError::ConnectionFailed {
            url,
            reason: ProtocolError::HandshakeIncomplete.to_string(),
        },
        Error::Protocol(e) => TransportError::HandshakeRejected {
            url,
            reason: e.to_string(),
        },
        Error::Io(e) => TransportError::ConnectionFailed {
            url,
            reason: e.to_string(),
        },
        other => TransportError::ConnectionFailed {
            url,
            reason: other.to_string(),
        },
    }
}
