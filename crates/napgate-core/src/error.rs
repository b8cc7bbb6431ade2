//! Error types shared by the napgate crates.
//!
//! Framework-level errors (plugin loading, manifests) live in
//! `napgate-framework`; configuration errors live in `napgate-runtime`.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur in transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The connection target is malformed (bad URI, unsupported scheme,
    /// invalid header value). Never retried.
    #[error("invalid connection target: {url} - {reason}")]
    InvalidUri {
        /// The offending URL.
        url: String,
        /// Reason for rejection.
        reason: String,
    },

    /// The server refused the WebSocket upgrade. Never retried.
    #[error("handshake rejected by {url}: {reason}")]
    HandshakeRejected {
        /// The URL that rejected the handshake.
        url: String,
        /// Reason for rejection (usually the HTTP status).
        reason: String,
    },

    /// Connection failed for a transient reason.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Message send failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl TransportError {
    /// Returns `true` for errors that must stop the reconnect loop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidUri { .. } | Self::HandshakeRejected { .. }
        )
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Event Errors
// =============================================================================

/// Errors raised while decoding an inbound frame into an [`Event`](crate::Event).
#[derive(Debug, Clone, Error)]
pub enum EventError {
    /// The frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The frame is valid JSON but not an object.
    #[error("frame is not a JSON object (got {got})")]
    NotAnObject {
        /// JSON type name of the payload.
        got: &'static str,
    },
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

// =============================================================================
// Send Errors
// =============================================================================

/// Errors returned to handlers by the outbound builder.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The target passed to a group/private builder is of the wrong type.
    #[error("invalid target type: expected {expected} message, got {got}")]
    InvalidTargetType {
        /// What the builder mode requires.
        expected: &'static str,
        /// What was supplied.
        got: &'static str,
    },

    /// The event carries no id for the requested target.
    #[error("event has no {field} to reply to")]
    MissingTarget {
        /// The missing field.
        field: &'static str,
    },

    /// The action could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<serde_json::Error> for SendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for event decoding.
pub type EventResult<T> = Result<T, EventError>;

/// Result type for outbound operations.
pub type SendResult<T> = Result<T, SendError>;
