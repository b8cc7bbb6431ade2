//! napgate runtime: configuration, logging and the [`Gateway`] that ties
//! the connection manager, plugin registry and dispatcher together.
//!
//! ```ignore
//! use napgate_runtime::{Gateway, config::ConfigLoader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     Gateway::from_config(config).run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;

pub use config::{ConfigError, ConfigLoader, ConfigResult, GatewayConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use gateway::Gateway;
pub use logging::LoggingBuilder;

// Re-export tracing for use by plugin crates
pub use tracing;

/// Logging macros for plugin code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
