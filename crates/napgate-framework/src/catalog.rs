//! Lookup over the handlers linked into the binary.

use napgate_core::{PLUGIN_REGISTRY, PluginEntry};

/// Why a handler reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    NotFound,
    Ambiguous(Vec<String>),
}

/// Every `#[plugin]` handler the binary carries, sorted by path.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<PluginEntry>,
}

impl Catalog {
    /// Catalog of the handlers collected at link time.
    pub fn linked() -> Self {
        Self::from_entries(PLUGIN_REGISTRY.iter().copied())
    }

    /// Catalog over an explicit set of entries.
    pub fn from_entries(entries: impl IntoIterator<Item = PluginEntry>) -> Self {
        let mut entries: Vec<PluginEntry> = entries.into_iter().collect();
        // Link order is unspecified; sort so discovery is reproducible.
        entries.sort_by(|a, b| (a.module, a.name).cmp(&(b.module, b.name)));
        Self { entries }
    }

    pub fn entries(&self) -> &[PluginEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a handler reference from a manifest.
    ///
    /// A reference may be the full path (`crate::plugins::hello::greet`), any
    /// `::`-separated suffix of it (`hello::greet`) or the bare handler name
    /// (`greet`). An exact path match always wins; otherwise the reference
    /// must identify exactly one handler.
    pub fn resolve(&self, reference: &str) -> Result<&PluginEntry, Lookup> {
        let reference = reference.trim().trim_start_matches("::");
        if let Some(entry) = self.entries.iter().find(|e| e.path() == reference) {
            return Ok(entry);
        }

        let suffix = format!("::{reference}");
        let matches: Vec<&PluginEntry> = self
            .entries
            .iter()
            .filter(|e| e.name == reference || e.path().ends_with(&suffix))
            .collect();

        match matches.as_slice() {
            [] => Err(Lookup::NotFound),
            [entry] => Ok(entry),
            many => Err(Lookup::Ambiguous(many.iter().map(|e| e.path()).collect())),
        }
    }

    /// Public handlers defined in `module`.
    ///
    /// `module` may be a full module path or a suffix of one, so
    /// `plugins::hello` matches handlers from `echo_bot::plugins::hello`.
    pub fn in_module<'a>(&'a self, module: &str) -> impl Iterator<Item = &'a PluginEntry> + 'a {
        let module = module.trim().trim_start_matches("::").to_string();
        let suffix = format!("::{module}");
        self.entries.iter().filter(move |e| {
            e.is_public() && (e.module == module || e.module.ends_with(&suffix))
        })
    }

    /// Public handlers whose defining module's last segment is `leaf`.
    pub fn with_module_leaf<'a>(&'a self, leaf: &'a str) -> impl Iterator<Item = &'a PluginEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.is_public() && e.module_leaf() == leaf)
    }
}
