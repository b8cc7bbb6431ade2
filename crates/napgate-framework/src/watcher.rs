//! Hot reload.
//!
//! [`PluginWatcher`] observes the plugin roots and reports changes to
//! `*.plugin.toml` files. [`run_reload_loop`] turns those reports into
//! [`PluginRegistry::reload`] calls until cancelled.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_full::notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::discovery::{Discovery, is_manifest_name};
use crate::error::{PluginError, PluginResult};
use crate::registry::PluginRegistry;

/// Quiet period before a burst of filesystem events is reported.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// A batch of manifest changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginWatchEvent {
    pub paths: Vec<PathBuf>,
}

/// Watches plugin roots for manifest changes. Events stop once dropped.
pub struct PluginWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    dirs: Vec<PathBuf>,
}

impl PluginWatcher {
    /// Starts watching the directories `discovery` scans.
    ///
    /// Changes below excluded directories are ignored. Roots that do not
    /// exist yet are skipped with a warning.
    pub fn start(
        discovery: Arc<Discovery>,
        debounce: Duration,
    ) -> PluginResult<(Self, mpsc::UnboundedReceiver<PluginWatchEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let filter = Arc::clone(&discovery);

        let mut debouncer = new_debouncer(
            debounce,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    let mut paths = Vec::new();
                    for event in events {
                        if !matches!(
                            event.kind,
                            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                        ) {
                            continue;
                        }
                        for path in &event.paths {
                            let is_manifest = path.file_name().is_some_and(is_manifest_name);
                            if !is_manifest || filter.is_excluded_path(path) {
                                continue;
                            }
                            debug!(path = %path.display(), kind = ?event.kind, "Manifest changed");
                            if !paths.contains(path) {
                                paths.push(path.clone());
                            }
                        }
                    }
                    if !paths.is_empty() {
                        let _ = tx.send(PluginWatchEvent { paths });
                    }
                }
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "Plugin watcher error");
                    }
                }
            },
        )
        .map_err(|e| PluginError::Watch(e.to_string()))?;

        let mut dirs = Vec::new();
        for dir in discovery.watch_dirs() {
            if !dir.is_dir() {
                warn!(dir = %dir.display(), "Plugin root does not exist, not watching it");
                continue;
            }
            debouncer
                .watch(&dir, RecursiveMode::Recursive)
                .map_err(|e| PluginError::Watch(format!("{}: {e}", dir.display())))?;
            info!(dir = %dir.display(), "Watching plugin root");
            dirs.push(dir);
        }

        Ok((
            Self {
                _debouncer: debouncer,
                dirs,
            },
            rx,
        ))
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

/// Reloads `registry` for every batch received on `events`.
///
/// Batches that pile up while a reload runs are folded into the next one.
/// Returns when `cancel` fires or the watcher is dropped.
pub async fn run_reload_loop(
    registry: Arc<PluginRegistry>,
    mut events: mpsc::UnboundedReceiver<PluginWatchEvent>,
    cancel: CancellationToken,
) {
    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            batch = events.recv() => batch,
        };
        let Some(mut batch) = batch else {
            debug!("Plugin watcher closed");
            break;
        };
        while let Ok(more) = events.try_recv() {
            batch.paths.extend(more.paths);
        }

        info!(changed = batch.paths.len(), "Plugin manifests changed, reloading");
        match registry.reload().await {
            Ok(summary) if summary.failures.is_empty() => {}
            Ok(summary) => {
                warn!(
                    generation = summary.generation,
                    failures   = summary.failures.len(),
                    "Reload completed with failures"
                );
            }
            Err(e) => error!(error = %e, "Plugin reload failed"),
        }
    }
}
