//! Layered configuration on top of figment.
//!
//! Sources, later ones winning:
//!
//! 1. [`GatewayConfig::default`]
//! 2. `napgate.<profile>.toml`, when a profile is selected
//! 3. `napgate.toml` (or the one file given to [`ConfigLoader::file`])
//! 4. the legacy `URL` / `TOKEN` variables
//! 5. `NAPGATE_*` variables, `__` separating nested keys
//!    (`NAPGATE_CONNECTION__URL`, `NAPGATE_PLUGINS__WATCH=false`)
//! 6. [`ConfigLoader::set`]
//!
//! Variables from a `.env` file in the working directory count as
//! environment. The profile comes from [`ConfigLoader::profile`] or
//! `NAPGATE_PROFILE`.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .file("./deploy/napgate.toml")
//!     .set("plugins.watch", false)
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::Serialize;
use tracing::{debug, info};

use super::error::{ConfigError, ConfigResult};
use super::schema::GatewayConfig;
use super::validation::validate_config;

pub const CONFIG_FILE_NAME: &str = "napgate.toml";

const ENV_PREFIX: &str = "NAPGATE_";
const PROFILE_VAR: &str = "NAPGATE_PROFILE";

pub struct ConfigLoader {
    profile: Option<String>,
    /// Exactly this file; it must exist.
    explicit: Option<PathBuf>,
    /// The first directory holding `napgate.toml` is used; none is fine.
    search: Vec<PathBuf>,
    custom_search: bool,
    env: bool,
    overrides: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Searches the working directory and `<config dir>/napgate`.
    pub fn new() -> Self {
        let mut search = Vec::new();
        search.extend(std::env::current_dir().ok());
        search.extend(dirs::config_dir().map(|d| d.join("napgate")));

        Self {
            profile: None,
            explicit: None,
            search,
            custom_search: false,
            env: true,
            overrides: Figment::new(),
        }
    }

    /// Selects `napgate.<name>.toml` as an extra layer under `napgate.toml`.
    pub fn profile(mut self, name: impl Into<String>) -> Self {
        self.profile = Some(name.into());
        self
    }

    /// Searches only the directories given through this method.
    pub fn search_path(mut self, dir: impl AsRef<Path>) -> Self {
        if !self.custom_search {
            self.search.clear();
            self.custom_search = true;
        }
        self.search.push(dir.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit = Some(path.as_ref().to_path_buf());
        self
    }

    /// Ignores the process environment and `.env`.
    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Overrides one dotted key above every other source.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    pub fn load(self) -> ConfigResult<GatewayConfig> {
        let config: GatewayConfig = self.figment()?.extract()?;
        validate_config(&config)?;
        debug!(
            url      = %config.connection.url,
            roots    = ?config.plugins.roots,
            level    = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(mut self) -> ConfigResult<Figment> {
        if self.env {
            let _ = dotenvy::dotenv();
            if self.profile.is_none() {
                self.profile = std::env::var(PROFILE_VAR).ok().filter(|p| !p.is_empty());
            }
        }

        let mut figment = Figment::from(Serialized::defaults(GatewayConfig::default()));
        for path in self.files()? {
            info!(path = %path.display(), "Reading configuration");
            figment = figment.merge(Toml::file(path));
        }

        if self.env {
            figment = figment
                .merge(Env::raw().only(&["URL", "TOKEN"]).map(|key| {
                    if key.as_str().eq_ignore_ascii_case("url") {
                        "connection.url".into()
                    } else {
                        "connection.access_token".into()
                    }
                }))
                .merge(Env::prefixed(ENV_PREFIX).ignore(&["PROFILE"]).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    /// Files to merge, lowest priority first.
    fn files(&self) -> ConfigResult<Vec<PathBuf>> {
        if let Some(path) = &self.explicit {
            if !path.is_file() {
                return Err(ConfigError::Missing(path.clone()));
            }
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                return Err(ConfigError::NotToml(path.clone()));
            }
            return Ok(vec![path.clone()]);
        }

        let Some(dir) = self.search.iter().find(|d| d.join(CONFIG_FILE_NAME).is_file()) else {
            debug!(searched = ?self.search, "No configuration file, using defaults");
            return Ok(Vec::new());
        };
        let mut files = Vec::with_capacity(2);
        if let Some(profile) = &self.profile {
            let path = dir.join(format!("napgate.{profile}.toml"));
            if path.is_file() {
                files.push(path);
            }
        }
        files.push(dir.join(CONFIG_FILE_NAME));
        Ok(files)
    }
}

/// Loads from the default locations and the environment.
pub fn load_config() -> ConfigResult<GatewayConfig> {
    ConfigLoader::new().load()
}

/// Loads one file plus the environment.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<GatewayConfig> {
    ConfigLoader::new().file(path).load()
}
