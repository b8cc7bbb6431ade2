//! Live handler registry with atomic snapshot swaps.
//!
//! [`PluginRegistry`] holds the current [`Registry`] behind an
//! `RwLock<Arc<_>>`. Readers clone the `Arc` and keep using that snapshot for
//! as long as they like; a reload builds a complete replacement off to the
//! side and swaps the pointer in one step. An event is therefore dispatched
//! either entirely against the old handler set or entirely against the new
//! one, never a mix.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use napgate_core::{Client, Event, EventKind, HandlerResult, ParamShape, PluginEntry};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use crate::discovery::{Discovery, LoadedModule};
use crate::error::{PluginError, PluginResult};
use crate::manifest::EventFilter;

// =============================================================================
// HandlerDescriptor
// =============================================================================

/// A handler activated by a manifest.
pub struct HandlerDescriptor {
    name: String,
    module: String,
    manifest: PathBuf,
    entry: PluginEntry,
    events: EventFilter,
}

impl HandlerDescriptor {
    /// Creates a descriptor registered as `<module>::<local_name>`.
    pub fn new(
        entry: PluginEntry,
        module: &str,
        local_name: &str,
        manifest: impl Into<PathBuf>,
        events: EventFilter,
    ) -> Self {
        Self {
            name: format!("{module}::{local_name}"),
            module: module.to_string(),
            manifest: manifest.into(),
            entry,
            events,
        }
    }

    /// Qualified name, unique within a registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the plugin module that activated the handler.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    pub fn entry(&self) -> &PluginEntry {
        &self.entry
    }

    pub fn shape(&self) -> ParamShape {
        self.entry.shape
    }

    /// `file:line` of the handler function.
    pub fn source(&self) -> String {
        format!("{}:{}", self.entry.file, self.entry.line)
    }

    pub fn events(&self) -> &EventFilter {
        &self.events
    }

    pub fn accepts(&self, kind: EventKind) -> bool {
        self.events.accepts(kind)
    }

    /// Starts the handler. Nothing runs until the future is polled.
    pub fn invoke(&self, event: Event, client: Client) -> BoxFuture<'static, HandlerResult> {
        let call = self.entry.call;
        Box::pin(async move { call(event, client).await })
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("manifest", &self.manifest)
            .field("entry", &self.entry.path())
            .field("shape", &self.entry.shape)
            .field("events", &self.events)
            .finish()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// What happens when two handlers claim the same qualified name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The later registration replaces the earlier one in place.
    #[default]
    LastWins,
    /// The earlier registration stays and the later one is reported.
    Reject,
}

/// One immutable handler set, in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    handlers: Vec<Arc<HandlerDescriptor>>,
    generation: u64,
}

impl Registry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// How many reloads produced this snapshot. `0` until the first install.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<HandlerDescriptor>> {
        self.handlers.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<HandlerDescriptor>> {
        self.handlers.iter().find(|h| h.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Handlers subscribed to `kind`, in registration order.
    pub fn matching(&self, kind: EventKind) -> impl Iterator<Item = &Arc<HandlerDescriptor>> {
        self.handlers.iter().filter(move |h| h.accepts(kind))
    }
}

/// Accumulates descriptors while enforcing a [`CollisionPolicy`].
#[derive(Debug)]
pub struct RegistryBuilder {
    handlers: Vec<HandlerDescriptor>,
    index: HashMap<String, usize>,
    policy: CollisionPolicy,
}

impl RegistryBuilder {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            handlers: Vec::new(),
            index: HashMap::new(),
            policy,
        }
    }

    /// Adds a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::DuplicateHandler`] when the name is taken and
    /// the policy is [`CollisionPolicy::Reject`].
    pub fn insert(&mut self, descriptor: HandlerDescriptor) -> PluginResult<()> {
        let Some(&position) = self.index.get(descriptor.name()) else {
            self.index
                .insert(descriptor.name().to_string(), self.handlers.len());
            self.handlers.push(descriptor);
            return Ok(());
        };

        match self.policy {
            CollisionPolicy::LastWins => {
                warn!(
                    handler      = descriptor.name(),
                    old_manifest = %self.handlers[position].manifest().display(),
                    new_manifest = %descriptor.manifest().display(),
                    "Duplicate handler name, last registration wins"
                );
                self.handlers[position] = descriptor;
                Ok(())
            }
            CollisionPolicy::Reject => Err(PluginError::DuplicateHandler {
                path: descriptor.manifest().to_path_buf(),
                name: descriptor.name().to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn build(self) -> Registry {
        Registry {
            handlers: self.handlers.into_iter().map(Arc::new).collect(),
            generation: 0,
        }
    }
}

// =============================================================================
// PluginRegistry
// =============================================================================

/// Outcome of one reload pass.
#[derive(Debug, Clone)]
pub struct ReloadSummary {
    pub generation: u64,
    pub handlers: usize,
    pub modules: Vec<LoadedModule>,
    pub failures: Vec<PluginError>,
}

/// The live handler set plus the discovery that rebuilds it.
pub struct PluginRegistry {
    discovery: Arc<Discovery>,
    live: RwLock<Arc<Registry>>,
    // Serializes reloads. A request that arrives mid-reload waits and then
    // runs a fresh pass, so the last change on disk is always picked up.
    reload_gate: AsyncMutex<()>,
    generation: AtomicU64,
}

impl PluginRegistry {
    /// Creates a registry with no handlers. Call [`reload`](Self::reload)
    /// to populate it.
    pub fn new(discovery: Discovery) -> Self {
        Self {
            discovery: Arc::new(discovery),
            live: RwLock::new(Arc::new(Registry::empty())),
            reload_gate: AsyncMutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn discovery(&self) -> &Arc<Discovery> {
        &self.discovery
    }

    /// The current handler set. Never blocks on a reload in progress.
    pub fn snapshot(&self) -> Arc<Registry> {
        Arc::clone(&self.live.read())
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Publishes `registry` as the live handler set.
    pub fn install(&self, mut registry: Registry) -> Arc<Registry> {
        registry.generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let registry = Arc::new(registry);
        *self.live.write() = Arc::clone(&registry);
        registry
    }

    /// Rediscovers every manifest and swaps in the result.
    ///
    /// Per-manifest problems do not fail the reload; they are returned in
    /// the summary and the rest of the handler set still goes live.
    pub async fn reload(&self) -> PluginResult<ReloadSummary> {
        let _gate = self.reload_gate.lock().await;

        let discovery = Arc::clone(&self.discovery);
        let report = tokio::task::spawn_blocking(move || discovery.discover())
            .await
            .map_err(|e| {
                error!(error = %e, "Plugin discovery task failed");
                PluginError::ReloadAborted(e.to_string())
            })?;

        let registry = self.install(report.registry);
        info!(
            generation = registry.generation(),
            handlers   = registry.len(),
            modules    = report.modules.len(),
            failures   = report.failures.len(),
            "Plugins reloaded"
        );

        Ok(ReloadSummary {
            generation: registry.generation(),
            handlers: registry.len(),
            modules: report.modules,
            failures: report.failures,
        })
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("generation", &self.generation())
            .field("handlers", &self.snapshot().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::catalog::tests::entry;
    use crate::discovery::DiscoveryOptions;

    fn descriptor(module: &str, local: &str, manifest: &str) -> HandlerDescriptor {
        HandlerDescriptor::new(
            entry("bot::plugins::hello", "greet"),
            module,
            local,
            manifest,
            EventFilter::any(),
        )
    }

    #[test]
    fn test_last_wins_replaces_in_place() {
        let mut builder = RegistryBuilder::new(CollisionPolicy::LastWins);
        builder.insert(descriptor("a", "one", "first.plugin.toml")).unwrap();
        builder.insert(descriptor("a", "two", "first.plugin.toml")).unwrap();
        builder.insert(descriptor("a", "one", "second.plugin.toml")).unwrap();

        let registry = builder.build();
        assert_eq!(registry.names(), ["a::one", "a::two"]);
        assert_eq!(
            registry.get("a::one").unwrap().manifest(),
            Path::new("second.plugin.toml")
        );
    }

    #[test]
    fn test_reject_keeps_first() {
        let mut builder = RegistryBuilder::new(CollisionPolicy::Reject);
        builder.insert(descriptor("a", "one", "first.plugin.toml")).unwrap();
        let err = builder
            .insert(descriptor("a", "one", "second.plugin.toml"))
            .unwrap_err();
        assert!(matches!(err, PluginError::DuplicateHandler { ref name, .. } if name == "a::one"));

        let registry = builder.build();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("a::one").unwrap().manifest(),
            Path::new("first.plugin.toml")
        );
    }

    #[test]
    fn test_matching_respects_event_filter() {
        let mut builder = RegistryBuilder::new(CollisionPolicy::LastWins);
        builder.insert(descriptor("a", "all", "m.plugin.toml")).unwrap();
        builder
            .insert(HandlerDescriptor::new(
                entry("bot::plugins::hello", "greet"),
                "a",
                "notices",
                "m.plugin.toml",
                EventFilter::only([EventKind::Notice]),
            ))
            .unwrap();
        let registry = builder.build();

        let names: Vec<&str> = registry
            .matching(EventKind::GroupMessage)
            .map(|h| h.name())
            .collect();
        assert_eq!(names, ["a::all"]);
        assert_eq!(registry.matching(EventKind::Notice).count(), 2);
    }

    #[test]
    fn test_install_bumps_generation_and_keeps_old_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PluginRegistry::new(Discovery::new(
            Catalog::default(),
            DiscoveryOptions::new(dir.path()),
        ));
        assert_eq!(registry.generation(), 0);

        let before = registry.snapshot();
        let mut builder = RegistryBuilder::new(CollisionPolicy::LastWins);
        builder.insert(descriptor("a", "one", "m.plugin.toml")).unwrap();
        registry.install(builder.build());

        assert_eq!(registry.generation(), 1);
        assert_eq!(registry.snapshot().generation(), 1);
        assert_eq!(registry.snapshot().len(), 1);
        // A reader holding the previous snapshot is unaffected.
        assert!(before.is_empty());
    }

    #[tokio::test]
    async fn test_reload_discovers_manifests() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.plugin.toml"), "").unwrap();

        let catalog = Catalog::from_entries([entry("bot::plugins::hello", "greet")]);
        let registry = PluginRegistry::new(Discovery::new(catalog, DiscoveryOptions::new(dir.path())));

        let summary = tokio_test::assert_ok!(registry.reload().await);
        assert_eq!(summary.generation, 1);
        assert_eq!(summary.handlers, 1);
        assert!(summary.failures.is_empty());
        assert_eq!(registry.snapshot().names(), ["hello::greet"]);

        std::fs::remove_file(dir.path().join("hello.plugin.toml")).unwrap();
        let summary = registry.reload().await.unwrap();
        assert_eq!(summary.generation, 2);
        assert!(registry.snapshot().is_empty());
    }
}
