//! Checks that figment cannot express as types.

use super::error::{ConfigError, ConfigResult};
use super::schema::{ConnectionConfig, GatewayConfig, LogOutput, LoggingConfig, PluginsConfig};

pub fn validate_config(config: &GatewayConfig) -> ConfigResult<()> {
    validate_connection(&config.connection)?;
    validate_plugins(&config.plugins)?;
    validate_logging(&config.logging)
}

fn validate_connection(connection: &ConnectionConfig) -> ConfigResult<()> {
    let url = connection.url.trim();
    let bad = |reason| ConfigError::BadUrl {
        url: url.to_string(),
        reason,
    };

    let rest = url
        .strip_prefix("wss://")
        .or_else(|| url.strip_prefix("ws://"))
        .ok_or_else(|| bad(if url.is_empty() { "empty" } else { "scheme must be ws:// or wss://" }))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(bad("missing host"));
    }

    if connection.reconnect_delay_ms == 0 {
        return Err(ConfigError::invalid(
            "connection.reconnect_delay_ms",
            "must be greater than 0",
        ));
    }
    if connection.outbound_capacity == 0 {
        return Err(ConfigError::invalid(
            "connection.outbound_capacity",
            "must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_plugins(plugins: &PluginsConfig) -> ConfigResult<()> {
    if plugins.watch && plugins.watch_debounce_ms == 0 {
        return Err(ConfigError::invalid(
            "plugins.watch_debounce_ms",
            "must be greater than 0 while watching",
        ));
    }
    match plugins
        .exclude
        .iter()
        .find(|name| name.is_empty() || name.contains(['/', '\\']))
    {
        Some(name) => Err(ConfigError::invalid(
            "plugins.exclude",
            format!("{name:?} is not a plain directory name"),
        )),
        None => Ok(()),
    }
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::invalid(
            "logging.file_path",
            "required when output = \"file\"",
        ));
    }
    Ok(())
}
