//! # Logger
//!
//! Installs the global `tracing` subscriber for processes that embed a lanebus
//! [`EventBus`](https://docs.rs/lanebus-event-bus) and for the workspace's tests.
//!
//! * Level and module directives come from [`LoggerBuilder::level`] and
//!   [`LoggerBuilder::env_filter`]; `RUST_LOG` is honoured when no explicit
//!   filter is given.
//! * Output is compact ANSI text or JSON lines on stderr, or routed through the
//!   libtest capture with [`LoggerBuilder::test_writer`].
//!
//! ## Example
//!
//! ```rust
//! use lanebus_logger::{LevelFilter, LogFormat, Logger};
//!
//! Logger::builder()
//!     .level(LevelFilter::DEBUG)
//!     .env_filter("lanebus_event_bus=trace")
//!     .format(LogFormat::Compact)
//!     .init()
//!     .unwrap();
//! ```

mod error;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;

use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

#[derive(Debug)]
struct LoggerConfig {
    level: LevelFilter,
    env_filter: Option<String>,
    format: LogFormat,
    ansi: bool,
    test_writer: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            env_filter: None,
            format: LogFormat::Compact,
            ansi: true,
            test_writer: false,
        }
    }
}

/// A builder for configuring and installing the global tracing subscriber.
#[derive(Debug, Default)]
pub struct LoggerBuilder {
    config: LoggerConfig,
}

impl LoggerBuilder {
    /// Configures the minimum log level to be emitted.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.config.level = level;
        self
    }

    /// Adds an explicit env filter (e.g., `lanebus_event_bus=trace`).
    ///
    /// Replaces `RUST_LOG`. Invalid filters make [`LoggerBuilder::init`] fail.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn env_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.env_filter = Some(filter.into());
        self
    }

    /// Selects the output format.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Enables or disables ANSI colours for compact output.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn ansi(mut self, enabled: bool) -> Self {
        self.config.ansi = enabled;
        self
    }

    /// Writes through libtest's output capture instead of raw stderr.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn test_writer(mut self, enabled: bool) -> Self {
        self.config.test_writer = enabled;
        self
    }

    /// Consumes the builder and installs the global tracing subscriber.
    ///
    /// # Errors
    /// Returns [`LoggerError::Subscriber`] if a global subscriber has already been set,
    /// or [`LoggerError::InvalidConfiguration`] for an unparsable env filter.
    pub fn init(self) -> Result<(), LoggerError> {
        let env_filter = build_env_filter(&self.config)?;

        let fmt_layer = match (self.config.format, self.config.test_writer) {
            (LogFormat::Compact, false) => {
                layer().compact().with_ansi(self.config.ansi).with_writer(std::io::stderr).boxed()
            },
            (LogFormat::Compact, true) => {
                layer().compact().with_ansi(self.config.ansi).with_test_writer().boxed()
            },
            (LogFormat::Json, false) => {
                layer().json().with_ansi(false).with_writer(std::io::stderr).boxed()
            },
            (LogFormat::Json, true) => layer().json().with_ansi(false).with_test_writer().boxed(),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .context("Installing global tracing subscriber")?;

        Ok(())
    }
}

/// Entry point for logger configuration.
#[derive(Debug)]
pub struct Logger;

impl Logger {
    /// Returns a new [`LoggerBuilder`] with `INFO` level and compact output.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }
}

fn build_env_filter(config: &LoggerConfig) -> Result<EnvFilter, LoggerError> {
    let builder = EnvFilter::builder().with_default_directive(config.level.into());
    config.env_filter.as_ref().map_or_else(
        || Ok(builder.from_env_lossy()),
        |filter| {
            builder.parse(filter).map_err(|e| LoggerError::InvalidConfiguration {
                message: format!("Invalid env filter '{filter}': {e}").into(),
                context: None,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let builder = Logger::builder();
        assert_eq!(builder.config.level, LevelFilter::INFO);
        assert_eq!(builder.config.format, LogFormat::Compact);
        assert!(builder.config.env_filter.is_none());
        assert!(builder.config.ansi);
        assert!(!builder.config.test_writer);
    }

    #[test]
    fn builder_configuration() {
        let builder = Logger::builder()
            .level(LevelFilter::DEBUG)
            .env_filter("lanebus_event_bus=trace")
            .format(LogFormat::Json)
            .ansi(false)
            .test_writer(true);

        assert_eq!(builder.config.level, LevelFilter::DEBUG);
        assert_eq!(builder.config.env_filter.as_deref(), Some("lanebus_event_bus=trace"));
        assert_eq!(builder.config.format, LogFormat::Json);
        assert!(!builder.config.ansi);
        assert!(builder.config.test_writer);
    }

    #[test]
    fn invalid_env_filter_is_rejected() {
        let config = LoggerConfig {
            env_filter: Some("lanebus=notalevel".to_owned()),
            ..LoggerConfig::default()
        };
        let err = build_env_filter(&config).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }
}
