//! Link-time handler catalog.
//!
//! Handler functions annotated with `#[plugin]` are collected into
//! [`PLUGIN_REGISTRY`] at link time. The catalog only says which handlers
//! exist in the binary; which of them are live is decided by the plugin
//! registry from the manifests it discovers on disk.

use std::fmt;

use futures::future::BoxFuture;
use linkme::distributed_slice;

use crate::client::Client;
use crate::event::Event;

/// Error type returned by failing handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a single handler invocation.
pub type HandlerResult = Result<(), BoxError>;

/// Type-erased handler entry point generated by `#[plugin]`.
pub type HandlerFn = fn(Event, Client) -> BoxFuture<'static, HandlerResult>;

/// How the handler wants to receive the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamShape {
    /// The untyped JSON payload (`serde_json::Value`).
    Raw,
    /// The [`Event`] wrapper.
    Wrapped,
}

impl fmt::Display for ParamShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::Wrapped => f.write_str("wrapped"),
        }
    }
}

/// A compiled handler, as registered by `#[plugin]`.
#[derive(Clone, Copy)]
pub struct PluginEntry {
    /// Handler name (function name unless overridden).
    pub name: &'static str,
    /// `module_path!()` of the defining module.
    pub module: &'static str,
    /// Source file of the handler function.
    pub file: &'static str,
    /// Source line of the handler function.
    pub line: u32,
    /// Parameter shape of the handler function.
    pub shape: ParamShape,
    /// Entry point.
    pub call: HandlerFn,
}

impl PluginEntry {
    /// `module::name`, unique within a binary.
    pub fn path(&self) -> String {
        format!("{}::{}", self.module, self.name)
    }

    /// Last segment of the defining module path.
    pub fn module_leaf(&self) -> &'static str {
        self.module.rsplit("::").next().unwrap_or(self.module)
    }

    /// Names starting with `_` are never loaded by convention.
    pub fn is_public(&self) -> bool {
        !self.name.starts_with('_')
    }
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("file", &self.file)
            .field("line", &self.line)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Every handler linked into the binary.
#[distributed_slice]
pub static PLUGIN_REGISTRY: [PluginEntry];

/// Normalizes handler return values.
///
/// Handlers may return `()` or any `Result<(), E>` whose error converts into
/// [`BoxError`].
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E> IntoHandlerResult for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}
