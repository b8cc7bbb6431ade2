//! `*.plugin.toml` manifests.
//!
//! A manifest turns compiled handlers into a live plugin module:
//!
//! ```toml
//! [plugin]
//! description = "Greets people"
//! # module = "plugins::hello"   # defaults to handlers of the module named like the file
//!
//! [[handler]]
//! name = "greet"                 # handler name or path suffix
//! alias = "hello"                # registered as `<module>::hello`
//! events = ["group_message"]     # defaults to every event
//! ```
//!
//! A manifest without `[[handler]]` tables loads every public handler of its
//! module.

use std::path::Path;

use figment::Figment;
use figment::providers::{Format, Toml};
use napgate_core::EventKind;
use serde::Deserialize;

use crate::error::{PluginError, PluginResult};

/// File name suffix that marks a plugin manifest.
pub const MANIFEST_SUFFIX: &str = ".plugin.toml";

fn default_true() -> bool {
    true
}

/// Parsed manifest file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginManifest {
    #[serde(default)]
    pub plugin: PluginSection,
    #[serde(default, rename = "handler")]
    pub handlers: Vec<HandlerSpec>,
}

/// `[plugin]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Rust module whose handlers the convention loads.
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for PluginSection {
    fn default() -> Self {
        Self {
            enabled: true,
            module: None,
            description: None,
        }
    }
}

/// One `[[handler]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerSpec {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub events: Vec<String>,
}

impl PluginManifest {
    /// Reads and parses a manifest file.
    pub fn load(path: &Path) -> PluginResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PluginError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&content).map_err(|reason| PluginError::Manifest {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parses manifest text.
    pub fn parse(content: &str) -> Result<Self, String> {
        let manifest: Self = Figment::from(Toml::string(content))
            .extract()
            .map_err(|e| e.to_string())?;

        for handler in &manifest.handlers {
            if handler.name.trim().is_empty() {
                return Err("handler name cannot be empty".to_string());
            }
            if handler.alias.as_deref().is_some_and(|a| a.trim().is_empty()) {
                return Err(format!("alias of handler '{}' cannot be empty", handler.name));
            }
            EventFilter::parse(&handler.events)?;
        }
        Ok(manifest)
    }
}

/// Module stem of a manifest file name (`hello.plugin.toml` → `hello`).
pub fn manifest_stem(path: &Path) -> Option<&str> {
    path.file_name()?
        .to_str()?
        .strip_suffix(MANIFEST_SUFFIX)
        .filter(|stem| !stem.is_empty())
}

// =============================================================================
// EventFilter
// =============================================================================

/// Which event kinds a handler subscribes to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// Accepts every event.
    pub fn any() -> Self {
        Self { kinds: None }
    }

    pub fn only(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        let mut unique = Vec::new();
        for kind in kinds {
            if !unique.contains(&kind) {
                unique.push(kind);
            }
        }
        Self { kinds: Some(unique) }
    }

    /// Builds a filter from manifest event names.
    ///
    /// An empty list, `"*"` or `"all"` accept everything. `"message"` expands
    /// to both message kinds. Other names use the [`EventKind`] spelling or
    /// one of its aliases.
    pub fn parse(names: &[String]) -> Result<Self, String> {
        let mut kinds = Vec::new();
        for name in names {
            match name.trim() {
                "*" | "all" => return Ok(Self::any()),
                "message" => {
                    kinds.push(EventKind::GroupMessage);
                    kinds.push(EventKind::PrivateMessage);
                }
                other => {
                    let kind: EventKind =
                        serde_json::from_value(serde_json::Value::String(other.to_string()))
                            .map_err(|_| format!("unknown event kind '{other}'"))?;
                    kinds.push(kind);
                }
            }
        }
        if kinds.is_empty() {
            return Ok(Self::any());
        }
        Ok(Self::only(kinds))
    }

    pub fn accepts(&self, kind: EventKind) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }

    pub fn is_any(&self) -> bool {
        self.kinds.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_manifest() {
        let manifest = PluginManifest::parse(
            r#"
            [plugin]
            description = "Greets people"
            module = "plugins::hello"

            [[handler]]
            name = "greet"
            alias = "hello"
            events = ["group", "private_message"]

            [[handler]]
            name = "farewell"
            enabled = false
            "#,
        )
        .unwrap();

        assert!(manifest.plugin.enabled);
        assert_eq!(manifest.plugin.module.as_deref(), Some("plugins::hello"));
        assert_eq!(manifest.handlers.len(), 2);
        assert_eq!(manifest.handlers[0].alias.as_deref(), Some("hello"));
        assert!(!manifest.handlers[1].enabled);
        assert!(manifest.handlers[1].events.is_empty());
    }

    #[test]
    fn test_empty_manifest_uses_defaults() {
        let manifest = PluginManifest::parse("").unwrap();
        assert!(manifest.plugin.enabled);
        assert!(manifest.handlers.is_empty());
    }

    #[test]
    fn test_rejects_bad_manifests() {
        assert!(PluginManifest::parse("[plugin\nenabled = true").is_err());
        assert!(PluginManifest::parse("[[handler]]\nalias = \"x\"").is_err());
        assert!(PluginManifest::parse("[[handler]]\nname = \"\"").is_err());
        assert!(PluginManifest::parse("[[handler]]\nname = \"a\"\npriority = 3").is_err());
        let err = PluginManifest::parse("[[handler]]\nname = \"a\"\nevents = [\"nope\"]")
            .unwrap_err();
        assert!(err.contains("nope"));
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::parse(&["message".into(), "notice".into()]).unwrap();
        assert!(filter.accepts(EventKind::GroupMessage));
        assert!(filter.accepts(EventKind::PrivateMessage));
        assert!(filter.accepts(EventKind::Notice));
        assert!(!filter.accepts(EventKind::Meta));

        assert!(EventFilter::parse(&[]).unwrap().is_any());
        assert!(EventFilter::parse(&["meta".into(), "*".into()]).unwrap().is_any());
        assert!(EventFilter::parse(&["meta_event".into()]).unwrap().accepts(EventKind::Meta));
    }

    #[test]
    fn test_repeated_kinds_are_kept_once() {
        let filter = EventFilter::parse(&["group".into(), "private".into(), "group".into()]).unwrap();
        assert_eq!(
            filter.kinds.as_deref(),
            Some(&[EventKind::GroupMessage, EventKind::PrivateMessage][..])
        );

        let filter = EventFilter::parse(&["message".into(), "private".into()]).unwrap();
        assert_eq!(filter.kinds.map(|k| k.len()), Some(2));
    }

    #[test]
    fn test_manifest_stem() {
        assert_eq!(manifest_stem(Path::new("a/hello.plugin.toml")), Some("hello"));
        assert_eq!(manifest_stem(Path::new("a/.plugin.toml")), None);
        assert_eq!(manifest_stem(Path::new("a/hello.toml")), None);
    }
}
