//! # napgate framework
//!
//! Turns compiled `#[plugin]` handlers into a live, reloadable handler set and
//! routes events to it.
//!
//! ```text
//!  *.plugin.toml ──▶ Discovery ──▶ Registry ──(swap)──▶ PluginRegistry
//!        ▲                                                  │ snapshot
//!  PluginWatcher ──▶ run_reload_loop ──▶ reload()           ▼
//!                                          Event ──▶ Dispatcher ──▶ handlers
//! ```
//!
//! - [`Catalog`]: every handler linked into the binary
//! - [`Discovery`]: manifest scan and handler resolution
//! - [`PluginRegistry`]: the current [`Registry`] snapshot plus reload
//! - [`Dispatcher`]: per-event fan-out with failure isolation
//! - [`PluginWatcher`]: filesystem notifications for hot reload

pub mod catalog;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod manifest;
pub mod registry;
#[cfg(feature = "file-watcher")]
pub mod watcher;

pub use catalog::{Catalog, Lookup};
pub use discovery::{
    DEFAULT_EXCLUDES, Discovery, DiscoveryOptions, DiscoveryReport, FoundManifest, LoadedModule,
};
pub use dispatcher::{DispatchMode, DispatchReport, Dispatcher, HandlerFailure};
pub use error::{PluginError, PluginResult};
pub use manifest::{EventFilter, HandlerSpec, MANIFEST_SUFFIX, PluginManifest, PluginSection};
pub use registry::{
    CollisionPolicy, HandlerDescriptor, PluginRegistry, Registry, RegistryBuilder, ReloadSummary,
};
#[cfg(feature = "file-watcher")]
pub use watcher::{DEFAULT_DEBOUNCE, PluginWatchEvent, PluginWatcher, run_reload_loop};
