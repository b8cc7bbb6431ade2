use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// A file passed to [`ConfigLoader::file`](super::ConfigLoader::file) is missing.
    #[error("config file {} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("config file {} is not a .toml file", .0.display())]
    NotToml(PathBuf),

    /// Merging or deserializing the layered sources failed.
    #[error("{0}")]
    Extract(Box<figment::Error>),

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("connection.url {url:?}: {reason}")]
    BadUrl { url: String, reason: &'static str },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// The dotted key the error is about, when known.
    pub fn field(&self) -> Option<String> {
        match self {
            Self::Invalid { field, .. } => Some(field.to_string()),
            Self::BadUrl { .. } => Some("connection.url".to_string()),
            Self::Extract(e) if !e.path.is_empty() => Some(e.path.join(".")),
            _ => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Extract(Box::new(e))
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
