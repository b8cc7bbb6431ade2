//! Echo Bot
//!
//! Connects to a OneBot v11 backend (NapCat, Lagrange, ...) and loads the
//! handlers enabled by the manifests under `plugins/`.
//!
//! ```text
//! plugins/
//! ├── echo.plugin.toml    → /echo, /ping, /help, /info
//! ├── greet.plugin.toml   → welcome new group members, poke back
//! └── audit.plugin.toml   → log every raw frame (disabled by default)
//! ```
//!
//! Editing a manifest while the bot runs reloads the plugin set.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --url ws://127.0.0.1:3001 --token secret
//! ```

mod plugins;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use napgate::prelude::*;
use napgate::runtime::config::LogLevel;

#[derive(Debug, Parser)]
#[command(name = "echo-bot", version, about = "A napgate echo bot")]
struct Cli {
    /// Configuration file (defaults to ./napgate.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend WebSocket URL
    #[arg(long)]
    url: Option<String>,

    /// Access token sent as a bearer token
    #[arg(long)]
    token: Option<String>,

    /// Plugin manifest directories (repeatable)
    #[arg(short, long = "plugins")]
    plugins: Vec<PathBuf>,

    /// Disable hot reload of plugin manifests
    #[arg(long)]
    no_watch: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<LogLevel>,
}

impl Cli {
    fn loader(self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();
        if let Some(path) = self.config {
            loader = loader.file(path);
        }
        if let Some(url) = self.url {
            loader = loader.set("connection.url", url);
        }
        if let Some(token) = self.token {
            loader = loader.set("connection.access_token", token);
        }
        if !self.plugins.is_empty() {
            loader = loader.set("plugins.roots", self.plugins);
        }
        if self.no_watch {
            loader = loader.set("plugins.watch", false);
        }
        if let Some(level) = self.log_level {
            loader = loader.set("logging.level", level);
        }
        loader
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().loader().load()?;

    let gateway = Gateway::from_config(config);
    gateway.run().await?;

    Ok(())
}
