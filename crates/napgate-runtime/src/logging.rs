//! Global `tracing` subscriber for the gateway.
//!
//! ```rust,ignore
//! use napgate_runtime::logging;
//!
//! // from the [logging] section
//! logging::init_from_config(&config.logging);
//!
//! // or by hand
//! logging::LoggingBuilder::new()
//!     .with_level(tracing::Level::DEBUG)
//!     .directive("napgate_transport=trace")
//!     .init();
//! ```
//!
//! The configured level is the default directive; `RUST_LOG` is layered on
//! top of it, and per-target `[logging.filters]` entries on top of that.

use std::path::{Path, PathBuf};

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig};

/// Default file name when `file_path` names a directory-less stem.
const DEFAULT_LOG_FILE: &str = "napgate.log";

/// Installs the subscriber described by `config`.
///
/// A subscriber that is already installed (tests, embedding binaries) is
/// left alone.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug)]
pub struct LoggingBuilder {
    level: Level,
    directives: Vec<String>,
    format: LogFormat,
    output: LogOutput,
    file: Option<PathBuf>,
    thread_ids: bool,
    source_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            level: Level::INFO,
            directives: Vec::new(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file: None,
            thread_ids: false,
            source_location: false,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut targets: Vec<_> = config.filters.iter().collect();
        targets.sort_by(|a, b| a.0.cmp(b.0));

        Self {
            level: config.level.to_tracing_level(),
            directives: targets
                .into_iter()
                .map(|(target, level)| format!("{target}={}", level.as_str()))
                .collect(),
            format: config.format,
            output: config.output,
            file: config.file_path.clone(),
            thread_ids: config.thread_ids,
            source_location: config.file_location,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a directive such as `napgate_framework=debug`. Malformed
    /// directives are ignored.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Writes to `path` (implies [`LogOutput::File`]).
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = LogOutput::File;
        self.file = Some(path.into());
        self
    }

    pub fn thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    /// Includes file and line of each event.
    pub fn source_location(mut self, enabled: bool) -> Self {
        self.source_location = enabled;
        self
    }

    /// Installs the subscriber, ignoring a second initialization.
    pub fn init(self) {
        let _ = self.try_init();
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.env_filter();
        let (writer, fallback) = self.make_writer();
        let result = tracing_subscriber::registry()
            .with(self.format_layer(writer))
            .with(filter)
            .try_init();

        if fallback && result.is_ok() {
            tracing::warn!("File logging requested without a path, writing to stdout");
        }
        result
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .from_env_lossy();
        for directive in self.directives.iter().filter_map(|d| d.parse().ok()) {
            filter = filter.add_directive(directive);
        }
        filter
    }

    /// Returns the writer and whether it had to fall back to stdout.
    fn make_writer(&self) -> (BoxMakeWriter, bool) {
        match (&self.output, &self.file) {
            (LogOutput::Stdout, _) => (BoxMakeWriter::new(std::io::stdout), false),
            (LogOutput::Stderr, _) => (BoxMakeWriter::new(std::io::stderr), false),
            (LogOutput::File, Some(path)) => {
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let name = path
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
                let appender = tracing_appender::rolling::never(dir, name);
                (BoxMakeWriter::new(appender), false)
            }
            (LogOutput::File, None) => (BoxMakeWriter::new(std::io::stdout), true),
        }
    }

    fn format_layer(&self, writer: BoxMakeWriter) -> BoxedLayer {
        let ansi = matches!(self.output, LogOutput::Stdout | LogOutput::Stderr);
        let base = fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_thread_ids(self.thread_ids)
            .with_file(self.source_location)
            .with_line_number(self.source_location);

        match self.format {
            LogFormat::Compact => base.compact().boxed(),
            LogFormat::Pretty => base.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => base.json().boxed(),
            // Without `json-log`, JSON falls back to the full format.
            _ => base.boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            thread_ids: true,
            file_location: true,
            ..Default::default()
        };
        config
            .filters
            .insert("napgate_transport".to_string(), LogLevel::Trace);
        config
            .filters
            .insert("napgate_framework".to_string(), LogLevel::Warn);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, Level::DEBUG);
        assert_eq!(builder.format, LogFormat::Pretty);
        assert!(builder.thread_ids && builder.source_location);
        assert_eq!(
            builder.directives,
            ["napgate_framework=warn", "napgate_transport=trace"]
        );
    }

    #[test]
    fn test_file_output_without_path_falls_back() {
        let builder = LoggingBuilder::new().output(LogOutput::File);
        assert!(builder.make_writer().1);

        let dir = tempfile::tempdir().unwrap();
        let builder = LoggingBuilder::new().file(dir.path().join("gateway.log"));
        assert_eq!(builder.output, LogOutput::File);
        assert!(!builder.make_writer().1);
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        LoggingBuilder::new().output(LogOutput::Stderr).init();
        assert!(
            LoggingBuilder::new()
                .output(LogOutput::Stderr)
                .try_init()
                .is_err()
        );
    }
}
