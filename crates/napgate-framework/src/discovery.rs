//! Manifest discovery.
//!
//! Walks the configured plugin roots for `*.plugin.toml` files and turns each
//! one into a set of [`HandlerDescriptor`]s. With no roots configured the
//! whole project tree is scanned, minus build output and tool directories.
//!
//! Every manifest gets a module identity derived from its location:
//!
//! | root        | manifest                             | identity             |
//! |-------------|--------------------------------------|----------------------|
//! | `plugins`   | `plugins/admin/ban.plugin.toml`      | `plugins::admin::ban`|
//! | *(project)* | `bots/hello.plugin.toml`             | `bots::hello`        |
//!
//! A manifest reached twice (overlapping roots, symlinks) or a second
//! manifest with an identity already seen is skipped.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use napgate_core::PluginEntry;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::catalog::{Catalog, Lookup};
use crate::error::{PluginError, PluginResult};
use crate::manifest::{EventFilter, MANIFEST_SUFFIX, PluginManifest, manifest_stem};
use crate::registry::{CollisionPolicy, HandlerDescriptor, Registry, RegistryBuilder};

/// Directories never descended into during a scan.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "target",
    ".git",
    "venv",
    ".venv",
    "node_modules",
    "__pycache__",
];

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Plugin roots. Relative roots resolve against `project_root`. Blank
    /// entries are ignored; if nothing is left the project root is scanned.
    pub roots: Vec<PathBuf>,
    pub project_root: PathBuf,
    /// Extra directory names to skip, on top of [`DEFAULT_EXCLUDES`].
    pub exclude: Vec<String>,
    pub collisions: CollisionPolicy,
}

impl DiscoveryOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            roots: Vec::new(),
            project_root: project_root.into(),
            exclude: Vec::new(),
            collisions: CollisionPolicy::default(),
        }
    }

    pub fn with_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.roots = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_collisions(mut self, policy: CollisionPolicy) -> Self {
        self.collisions = policy;
        self
    }
}

/// A directory to scan and the identity prefix for manifests below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRoot {
    pub path: PathBuf,
    pub prefix: Option<String>,
}

/// A manifest file located by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundManifest {
    pub path: PathBuf,
    pub module: String,
}

// =============================================================================
// Report
// =============================================================================

/// A manifest that was read successfully.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub module: String,
    pub manifest: PathBuf,
    pub description: Option<String>,
    pub enabled: bool,
    /// Qualified names of the handlers the manifest activated.
    pub handlers: Vec<String>,
}

#[derive(Debug)]
pub struct DiscoveryReport {
    pub registry: Registry,
    pub modules: Vec<LoadedModule>,
    pub failures: Vec<PluginError>,
}

// =============================================================================
// Discovery
// =============================================================================

pub struct Discovery {
    catalog: Arc<Catalog>,
    options: DiscoveryOptions,
}

impl Discovery {
    pub fn new(catalog: Catalog, options: DiscoveryOptions) -> Self {
        Self {
            catalog: Arc::new(catalog),
            options,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Resolves the configured roots into directories to scan.
    pub fn scan_roots(&self) -> Vec<ScanRoot> {
        let roots: Vec<ScanRoot> = self
            .options
            .roots
            .iter()
            .filter(|root| !root.to_string_lossy().trim().is_empty())
            .map(|root| {
                let path = if root.is_absolute() {
                    root.clone()
                } else {
                    self.options.project_root.join(root)
                };
                let prefix = path
                    .file_name()
                    .and_then(OsStr::to_str)
                    .map(str::to_string);
                ScanRoot { path, prefix }
            })
            .collect();

        if roots.is_empty() {
            vec![ScanRoot {
                path: self.options.project_root.clone(),
                prefix: None,
            }]
        } else {
            roots
        }
    }

    /// Directories a watcher should observe.
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        self.scan_roots().into_iter().map(|root| root.path).collect()
    }

    /// `true` when a directory with this name is skipped.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        DEFAULT_EXCLUDES.contains(&name)
            || self.options.exclude.iter().any(|e| e == name)
            || name.starts_with('.')
    }

    /// `true` when `path` lies below an excluded directory of a scan root.
    pub fn is_excluded_path(&self, path: &Path) -> bool {
        self.scan_roots().iter().any(|root| {
            path.strip_prefix(&root.path).is_ok_and(|rel| {
                rel.parent().is_some_and(|parent| {
                    parent
                        .components()
                        .filter_map(|c| c.as_os_str().to_str())
                        .any(|name| self.is_excluded_dir(name))
                })
            })
        })
    }

    /// Locates manifests below every scan root.
    ///
    /// Results are sorted by path within each root and deduplicated.
    pub fn find_manifests(&self) -> (Vec<FoundManifest>, Vec<PluginError>) {
        let mut found = Vec::new();
        let mut failures = Vec::new();
        let mut seen_paths: HashSet<PathBuf> = HashSet::new();
        let mut seen_modules: HashSet<String> = HashSet::new();

        for root in self.scan_roots() {
            if !root.path.is_dir() {
                warn!(root = %root.path.display(), "Plugin root is not a directory");
                failures.push(PluginError::Io {
                    path: root.path.clone(),
                    reason: "not a directory".to_string(),
                });
                continue;
            }

            let walker = WalkDir::new(&root.path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| {
                    entry.depth() == 0
                        || !entry.file_type().is_dir()
                        || !entry
                            .file_name()
                            .to_str()
                            .is_some_and(|name| self.is_excluded_dir(name))
                });

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        let path = e.path().unwrap_or(root.path.as_path()).to_path_buf();
                        warn!(path = %path.display(), error = %e, "Skipping unreadable plugin path");
                        failures.push(PluginError::Io {
                            path,
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !is_manifest_name(entry.file_name()) {
                    continue;
                }

                let path = entry.into_path();
                let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
                if !seen_paths.insert(canonical) {
                    debug!(manifest = %path.display(), "Manifest already discovered");
                    continue;
                }

                let Some(module) = module_identity(&root, &path) else {
                    continue;
                };
                if !seen_modules.insert(module.clone()) {
                    warn!(
                        manifest = %path.display(),
                        module   = %module,
                        "Plugin module identity already taken, skipping manifest"
                    );
                    continue;
                }

                found.push(FoundManifest { path, module });
            }
        }

        (found, failures)
    }

    /// Runs a full discovery pass. Blocking.
    pub fn discover(&self) -> DiscoveryReport {
        let (found, mut failures) = self.find_manifests();
        let mut builder = RegistryBuilder::new(self.options.collisions);
        let mut modules = Vec::with_capacity(found.len());

        for manifest in &found {
            let (mut module, descriptors) = match self.load_module(manifest) {
                Ok(loaded) => loaded,
                Err(e) => {
                    error!(
                        manifest = %manifest.path.display(),
                        module   = %manifest.module,
                        error    = %e,
                        "Failed to load plugin module"
                    );
                    failures.push(e);
                    continue;
                }
            };

            for descriptor in descriptors {
                let name = descriptor.name().to_string();
                match builder.insert(descriptor) {
                    Ok(()) => module.handlers.push(name),
                    Err(e) => {
                        error!(handler = %name, error = %e, "Handler registration rejected");
                        failures.push(e);
                    }
                }
            }

            info!(
                module   = %module.module,
                handlers = module.handlers.len(),
                enabled  = module.enabled,
                "Loaded plugin module"
            );
            modules.push(module);
        }

        DiscoveryReport {
            registry: builder.build(),
            modules,
            failures,
        }
    }

    /// Reads one manifest and resolves its handlers.
    ///
    /// A module loads completely or not at all.
    fn load_module(
        &self,
        found: &FoundManifest,
    ) -> PluginResult<(LoadedModule, Vec<HandlerDescriptor>)> {
        let manifest = PluginManifest::load(&found.path)?;
        let mut module = LoadedModule {
            module: found.module.clone(),
            manifest: found.path.clone(),
            description: manifest.plugin.description.clone(),
            enabled: manifest.plugin.enabled,
            handlers: Vec::new(),
        };
        if !manifest.plugin.enabled {
            return Ok((module, Vec::new()));
        }

        let scope = manifest
            .plugin
            .module
            .clone()
            .or_else(|| manifest_stem(&found.path).map(str::to_string))
            .unwrap_or_default();

        let mut descriptors = Vec::new();
        if manifest.handlers.is_empty() {
            let entries: Vec<&PluginEntry> = if manifest.plugin.module.is_some() {
                self.catalog.in_module(&scope).collect()
            } else {
                self.catalog.with_module_leaf(&scope).collect()
            };
            if entries.is_empty() {
                warn!(
                    manifest = %found.path.display(),
                    scope    = %scope,
                    "Plugin manifest matched no handlers"
                );
            }
            for entry in entries {
                descriptors.push(HandlerDescriptor::new(
                    *entry,
                    &found.module,
                    entry.name,
                    &found.path,
                    EventFilter::any(),
                ));
            }
        } else {
            for spec in manifest.handlers.iter().filter(|spec| spec.enabled) {
                let entry = self.resolve_handler(&found.path, &scope, &spec.name)?;
                let events =
                    EventFilter::parse(&spec.events).map_err(|reason| PluginError::Manifest {
                        path: found.path.clone(),
                        reason,
                    })?;
                let local = spec.alias.as_deref().unwrap_or(entry.name);
                descriptors.push(HandlerDescriptor::new(
                    *entry,
                    &found.module,
                    local,
                    &found.path,
                    events,
                ));
            }
        }

        Ok((module, descriptors))
    }

    /// Looks `name` up inside the manifest's module first, then globally.
    fn resolve_handler(&self, path: &Path, scope: &str, name: &str) -> PluginResult<&PluginEntry> {
        let scoped = if scope.is_empty() || name.contains("::") {
            Err(Lookup::NotFound)
        } else {
            self.catalog.resolve(&format!("{scope}::{name}"))
        };

        scoped
            .or_else(|lookup| match lookup {
                Lookup::NotFound => self.catalog.resolve(name),
                ambiguous => Err(ambiguous),
            })
            .map_err(|lookup| match lookup {
                Lookup::NotFound => PluginError::UnknownHandler {
                    path: path.to_path_buf(),
                    name: name.to_string(),
                },
                Lookup::Ambiguous(candidates) => PluginError::AmbiguousHandler {
                    path: path.to_path_buf(),
                    name: name.to_string(),
                    candidates,
                },
            })
    }
}

/// `true` for `*.plugin.toml` names that are not hidden or private.
pub fn is_manifest_name(name: &OsStr) -> bool {
    name.to_str().is_some_and(|name| {
        name.ends_with(MANIFEST_SUFFIX)
            && name.len() > MANIFEST_SUFFIX.len()
            && !name.starts_with('.')
            && !name.starts_with('_')
    })
}

fn module_identity(root: &ScanRoot, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(&root.path).ok()?;
    let stem = manifest_stem(rel)?;

    let mut parts: Vec<String> = root.prefix.iter().cloned().collect();
    if let Some(parent) = rel.parent() {
        parts.extend(
            parent
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .map(str::to_string),
        );
    }
    parts.push(stem.to_string());
    Some(parts.join("::"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::entry;
    use std::fs;

    fn catalog() -> Catalog {
        Catalog::from_entries([
            entry("bot::plugins::hello", "greet"),
            entry("bot::plugins::hello", "wave"),
            entry("bot::plugins::hello", "_internal"),
            entry("bot::plugins::admin", "greet"),
            entry("bot::plugins::admin", "ban"),
        ])
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_convention_loads_public_handlers_of_stem_module() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "plugins/hello.plugin.toml", "");

        let discovery = Discovery::new(
            catalog(),
            DiscoveryOptions::new(dir.path()).with_roots(["plugins"]),
        );
        let report = discovery.discover();

        assert!(report.failures.is_empty());
        assert_eq!(
            report.registry.names(),
            ["plugins::hello::greet", "plugins::hello::wave"]
        );
        assert_eq!(report.modules.len(), 1);
        assert_eq!(report.modules[0].module, "plugins::hello");
    }

    #[test]
    fn test_explicit_handlers_with_alias_and_module() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "plugins/mod/tools.plugin.toml",
            r#"
            [plugin]
            module = "plugins::admin"

            [[handler]]
            name = "greet"
            alias = "welcome"
            events = ["notice"]

            [[handler]]
            name = "ban"
            enabled = false
            "#,
        );

        let discovery = Discovery::new(
            catalog(),
            DiscoveryOptions::new(dir.path()).with_roots(["plugins"]),
        );
        let report = discovery.discover();

        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.registry.names(), ["plugins::mod::tools::welcome"]);
        let handler = report.registry.get("plugins::mod::tools::welcome").unwrap();
        // Resolved within the manifest's module despite the ambiguous name.
        assert_eq!(handler.entry().module, "bot::plugins::admin");
        assert!(handler.accepts(napgate_core::EventKind::Notice));
        assert!(!handler.accepts(napgate_core::EventKind::GroupMessage));
    }

    #[test]
    fn test_bad_manifest_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hello.plugin.toml", "");
        write(dir.path(), "broken.plugin.toml", "[plugin\n");
        write(dir.path(), "missing.plugin.toml", "[[handler]]\nname = \"nothing\"\n");
        write(dir.path(), "vague.plugin.toml", "[[handler]]\nname = \"greet\"\n");

        let report = Discovery::new(catalog(), DiscoveryOptions::new(dir.path())).discover();

        assert_eq!(report.registry.names(), ["hello::greet", "hello::wave"]);
        assert_eq!(report.failures.len(), 3);
        assert!(report.failures.iter().any(|e| matches!(e, PluginError::Manifest { .. })));
        assert!(report.failures.iter().any(|e| matches!(e, PluginError::UnknownHandler { .. })));
        assert!(report.failures.iter().any(|e| matches!(e, PluginError::AmbiguousHandler { .. })));
    }

    #[test]
    fn test_project_scan_skips_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bots/hello.plugin.toml", "");
        write(dir.path(), "target/debug/hello.plugin.toml", "");
        write(dir.path(), ".git/hello.plugin.toml", "");
        write(dir.path(), "scratch/admin.plugin.toml", "");
        write(dir.path(), "bots/_draft.plugin.toml", "");

        let discovery = Discovery::new(
            catalog(),
            DiscoveryOptions::new(dir.path())
                .with_roots(["", "  "])
                .with_exclude(["scratch"]),
        );
        let (found, failures) = discovery.find_manifests();

        assert!(failures.is_empty());
        assert_eq!(
            found.iter().map(|f| f.module.as_str()).collect::<Vec<_>>(),
            ["bots::hello"]
        );
        assert!(discovery.is_excluded_path(&dir.path().join("target/debug/x.plugin.toml")));
        assert!(!discovery.is_excluded_path(&dir.path().join("bots/x.plugin.toml")));
    }

    #[test]
    fn test_overlapping_roots_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "plugins/hello.plugin.toml", "");

        let discovery = Discovery::new(
            catalog(),
            DiscoveryOptions::new(dir.path()).with_roots(["plugins", "plugins/"]),
        );
        let (found, _) = discovery.find_manifests();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_missing_root_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = Discovery::new(
            catalog(),
            DiscoveryOptions::new(dir.path()).with_roots(["nope"]),
        );
        let report = discovery.discover();
        assert!(report.registry.is_empty());
        assert!(matches!(report.failures.as_slice(), [PluginError::Io { .. }]));
    }

    #[test]
    fn test_reject_policy_reports_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "hello.plugin.toml",
            "[[handler]]\nname = \"greet\"\n\n[[handler]]\nname = \"wave\"\nalias = \"greet\"\n",
        );

        let report = Discovery::new(
            catalog(),
            DiscoveryOptions::new(dir.path()).with_collisions(CollisionPolicy::Reject),
        )
        .discover();

        assert_eq!(report.registry.len(), 1);
        assert_eq!(
            report.registry.get("hello::greet").unwrap().entry().name,
            "greet"
        );
        assert!(matches!(
            report.failures.as_slice(),
            [PluginError::DuplicateHandler { .. }]
        ));
    }

    #[test]
    fn test_disabled_plugin_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hello.plugin.toml", "[plugin]\nenabled = false\n");

        let report = Discovery::new(catalog(), DiscoveryOptions::new(dir.path())).discover();
        assert!(report.registry.is_empty());
        assert_eq!(report.modules.len(), 1);
        assert!(!report.modules[0].enabled);
    }

    #[test]
    fn test_manifest_names() {
        assert!(is_manifest_name(OsStr::new("hello.plugin.toml")));
        assert!(!is_manifest_name(OsStr::new(".hello.plugin.toml")));
        assert!(!is_manifest_name(OsStr::new("_hello.plugin.toml")));
        assert!(!is_manifest_name(OsStr::new(".plugin.toml")));
        assert!(!is_manifest_name(OsStr::new("hello.toml")));
    }
}
