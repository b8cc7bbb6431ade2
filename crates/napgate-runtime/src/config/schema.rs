//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use napgate_core::WsClientConfig;
use napgate_framework::{CollisionPolicy, DispatchMode};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub outbound: OutboundConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Connection
// =============================================================================

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// WebSocket endpoint of the backend (`ws://` or `wss://`).
    #[serde(default = "default_url")]
    pub url: String,

    /// Sent as `Authorization: Bearer <token>` during the handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Pause between reconnect attempts.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Frames that may queue for the writer before senders wait.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            access_token: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

impl ConnectionConfig {
    /// Converts to the transport's client config.
    pub fn to_client_config(&self) -> WsClientConfig {
        let mut config = WsClientConfig::new(&self.url)
            .with_reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
            .with_outbound_capacity(self.outbound_capacity);
        if let Some(token) = &self.access_token {
            config = config.with_access_token(token);
        }
        config
    }
}

fn default_url() -> String {
    "ws://127.0.0.1:3001".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_outbound_capacity() -> usize {
    256
}

// =============================================================================
// Plugins
// =============================================================================

/// Plugin discovery, reload and dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Directories scanned for manifests. Empty means the whole project.
    #[serde(default = "default_roots")]
    pub roots: Vec<PathBuf>,

    /// Base directory for relative roots. Defaults to the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,

    /// Directory names skipped during scans, in addition to the built-in ones.
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default = "default_true")]
    pub watch: bool,

    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,

    #[serde(default)]
    pub collisions: CollisionPolicy,

    #[serde(default)]
    pub dispatch: DispatchMode,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            project_root: None,
            exclude: Vec::new(),
            watch: true,
            watch_debounce_ms: default_watch_debounce_ms(),
            collisions: CollisionPolicy::default(),
            dispatch: DispatchMode::default(),
        }
    }
}

fn default_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("plugins")]
}

fn default_true() -> bool {
    true
}

fn default_watch_debounce_ms() -> u64 {
    500
}

// =============================================================================
// Outbound
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundConfig {
    /// Minimum spacing between two outbound actions. `0` disables pacing.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

fn default_min_interval_ms() -> u64 {
    100
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Required when `output = "file"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line in each record.
    #[serde(default)]
    pub file_location: bool,

    /// Per-target overrides, e.g. `napgate_transport = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.connection.url, "ws://127.0.0.1:3001");
        assert_eq!(config.connection.reconnect_delay_ms, 3000);
        assert_eq!(config.plugins.roots, [PathBuf::from("plugins")]);
        assert!(config.plugins.watch);
        assert_eq!(config.outbound.min_interval_ms, 100);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_client_config_conversion() {
        let connection = ConnectionConfig {
            url: "ws://backend:3001".to_string(),
            access_token: Some("secret".to_string()),
            reconnect_delay_ms: 250,
            outbound_capacity: 8,
        };
        let client = connection.to_client_config();
        assert_eq!(client.url, "ws://backend:3001");
        assert_eq!(client.access_token.as_deref(), Some("secret"));
        assert_eq!(client.reconnect_delay, Duration::from_millis(250));
        assert_eq!(client.outbound_capacity, 8);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
