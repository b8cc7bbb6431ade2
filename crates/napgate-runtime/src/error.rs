//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use napgate_core::TransportError;
use napgate_framework::PluginError;

/// Errors that stop the gateway.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The connection manager gave up (malformed URL or rejected handshake).
    #[error("Connection failed permanently: {0}")]
    Transport(#[from] TransportError),

    #[error("Plugin system error: {0}")]
    Plugin(#[from] PluginError),

    /// A signal handler could not be installed.
    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
