//! Configuration module for the napgate runtime.
//!
//! TOML files and `NAPGATE_*` environment variables layered with figment,
//! then validated before the gateway starts.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_FILE_NAME, ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    ConnectionConfig, GatewayConfig, LogFormat, LogLevel, LogOutput, LoggingConfig,
    OutboundConfig, PluginsConfig,
};
pub use validation::validate_config;
