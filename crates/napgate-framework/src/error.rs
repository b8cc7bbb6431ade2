//! Error types for plugin discovery and reload.

use std::path::PathBuf;

use thiserror::Error;

/// A problem with one manifest, one handler reference or the watcher.
///
/// Discovery never aborts on these. Each one is logged and collected into
/// the report so the remaining manifests still load.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// A plugin root or manifest could not be read.
    #[error("cannot read '{}': {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    /// A manifest is not valid TOML or does not match the manifest schema.
    #[error("invalid manifest '{}': {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    /// A manifest names a handler that is not linked into the binary.
    #[error("manifest '{}' references unknown handler '{name}'", path.display())]
    UnknownHandler { path: PathBuf, name: String },

    /// A short handler name matches more than one linked handler.
    #[error(
        "manifest '{}' references ambiguous handler '{name}' (candidates: {})",
        path.display(),
        candidates.join(", ")
    )]
    AmbiguousHandler {
        path: PathBuf,
        name: String,
        candidates: Vec<String>,
    },

    /// A second handler claimed a qualified name under the reject policy.
    #[error("handler '{name}' from '{}' is already registered", path.display())]
    DuplicateHandler { path: PathBuf, name: String },

    /// The filesystem watcher could not be started.
    #[error("plugin watcher error: {0}")]
    Watch(String),

    /// The background discovery task did not complete.
    #[error("plugin reload aborted: {0}")]
    ReloadAborted(String),
}

impl PluginError {
    /// Path of the manifest or root the error is about, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. }
            | Self::Manifest { path, .. }
            | Self::UnknownHandler { path, .. }
            | Self::AmbiguousHandler { path, .. }
            | Self::DuplicateHandler { path, .. } => Some(path),
            Self::Watch(_) | Self::ReloadAborted(_) => None,
        }
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;
