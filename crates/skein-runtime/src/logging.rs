//! Logging setup for skein, built on `tracing-subscriber`.
//!
//! # Configuration-Based Initialization
//!
//! ```rust,ignore
//! use skein_runtime::{config::load_config, logging};
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//! ```
//!
//! # Manual Initialization
//!
//! ```rust,ignore
//! use skein_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("skein_transport=trace")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

/// Which span lifecycle events are logged. `dispatch` spans are the
/// interesting ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close only.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        let mut span = fmt::format::FmtSpan::NONE;
        if self.new {
            span |= fmt::format::FmtSpan::NEW;
        }
        if self.enter {
            span |= fmt::format::FmtSpan::ENTER;
        }
        if self.exit {
            span |= fmt::format::FmtSpan::EXIT;
        }
        if self.close {
            span |= fmt::format::FmtSpan::CLOSE;
        }
        span
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

/// Initializes logging from a [`LoggingConfig`]. A second call is a no-op.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// Builder for the global tracing subscriber.
#[derive(Default)]
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: Option<tracing::Level>,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            with_target: true,
            ..Default::default()
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut builder = Self::new();
        builder.level = Some(config.level.to_tracing_level());
        builder.format = config.format;
        builder.output = config.output;
        builder.span_events = SpanEvents::from(&config.span_events);
        builder.with_thread_ids = config.thread_ids;
        builder.with_file = config.file_location;
        builder.with_line_number = config.file_location;
        builder.file_path.clone_from(&config.file_path);
        builder.rotation = config.rotation;

        for (module, level) in &config.filters {
            builder.directives.push(format!("{module}={level}"));
        }
        builder
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Adds a filter directive such as `skein_framework=debug`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_owned());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
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

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    pub fn file_path(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// `RUST_LOG` if set, else the configured level, plus every directive.
    fn build_filter(&self) -> EnvFilter {
        let base = self
            .level
            .unwrap_or(tracing::Level::INFO)
            .to_string()
            .to_lowercase();
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base));

        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("Ignoring invalid log directive {directive:?}: {e}"),
            }
        }
        filter
    }

    fn file_appender(&self, path: &Path) -> RollingFileAppender {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path.file_name().unwrap_or_else(|| OsStr::new("skein.log"));
        match self.rotation {
            LogRotation::Never => rolling::never(dir, name),
            LogRotation::Hourly => rolling::hourly(dir, name),
            LogRotation::Daily => rolling::daily(dir, name),
        }
    }

    /// Installs the subscriber; panics never, ignoring the error is fine.
    pub fn init(self) {
        let _ = self.try_init();
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        let span_events = self.span_events.to_fmt_span();

        macro_rules! configure_layer {
            ($layer:expr) => {
                $layer
                    .with_span_events(span_events.clone())
                    .with_target(self.with_target)
                    .with_thread_ids(self.with_thread_ids)
                    .with_file(self.with_file)
                    .with_line_number(self.with_line_number)
            };
        }

        macro_rules! init_with_writer {
            ($writer:expr) => {
                match self.format {
                    #[cfg(feature = "json-log")]
                    LogFormat::Json => {
                        let layer = fmt::layer()
                            .json()
                            .with_span_events(span_events.clone())
                            .with_writer($writer);
                        tracing_subscriber::registry()
                            .with(layer)
                            .with(filter)
                            .try_init()
                    }
                    #[cfg(not(feature = "json-log"))]
                    LogFormat::Json => {
                        let layer = configure_layer!(fmt::layer().compact().with_writer($writer));
                        let result = tracing_subscriber::registry()
                            .with(layer)
                            .with(filter)
                            .try_init();
                        warn!("JSON log format needs the `json-log` feature, using compact");
                        result
                    }
                    LogFormat::Compact => {
                        let layer = configure_layer!(fmt::layer().compact().with_writer($writer));
                        tracing_subscriber::registry()
                            .with(layer)
                            .with(filter)
                            .try_init()
                    }
                    LogFormat::Full => {
                        let layer = configure_layer!(fmt::layer().with_writer($writer));
                        tracing_subscriber::registry()
                            .with(layer)
                            .with(filter)
                            .try_init()
                    }
                    LogFormat::Pretty => {
                        let layer = configure_layer!(fmt::layer().pretty().with_writer($writer));
                        tracing_subscriber::registry()
                            .with(layer)
                            .with(filter)
                            .try_init()
                    }
                }
            };
        }

        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => init_with_writer!(std::io::stdout),
            (LogOutput::Stderr, _) => init_with_writer!(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                let appender = self.file_appender(path);
                init_with_writer!(appender)
            }
            (LogOutput::File, None) => {
                let result = init_with_writer!(std::io::stdout);
                warn!("File output requested but no file path configured, using stdout");
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_from_config_collects_filters() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            rotation: LogRotation::Daily,
            ..LoggingConfig::default()
        };
        config
            .filters
            .insert("skein_transport".into(), LogLevel::Trace);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, Some(tracing::Level::DEBUG));
        assert_eq!(builder.directives, vec!["skein_transport=trace"]);
        assert_eq!(builder.rotation, LogRotation::Daily);
    }

    #[test]
    fn test_span_events_map_to_fmt_span() {
        assert_eq!(SpanEvents::NONE.to_fmt_span(), fmt::format::FmtSpan::NONE);
        assert_eq!(
            SpanEvents::LIFECYCLE.to_fmt_span(),
            fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE
        );
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        init_from_config(&LoggingConfig::default());
        init_from_config(&LoggingConfig::default());
    }
}
