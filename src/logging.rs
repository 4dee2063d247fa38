//! Logging setup for the loader.
//!
//! Diagnostics go through `tracing` to stderr. The periodic progress lines a
//! load prints are user output, not logs, and are written by the CLI itself.
//!
//! # Usage
//!
//! ```rust
//! use tweet_loader::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default());
//! tracing::info!("Loader started");
//! ```

use std::time::Instant;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Crate name as it appears in filter directives.
const LOG_TARGET: &str = "tweet_loader";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display.
    pub level: LogLevel,
    /// Output format for log messages.
    pub format: LogFormat,
    /// Include timestamps in log output.
    pub timestamps: bool,
    /// Include target (module path) in log output.
    pub target: bool,
    /// Include span enter/exit events.
    pub spans: bool,
    /// Enable ANSI colors in output.
    pub colors: bool,
}

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Off,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single line per event.
    Compact,
    /// Single line with thread, file and line details.
    Full,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            timestamps: true,
            target: false,
            spans: false,
            colors: true,
        }
    }
}

impl LogConfig {
    /// Errors only.
    #[must_use]
    pub const fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            format: LogFormat::Compact,
            timestamps: false,
            target: false,
            spans: false,
            colors: true,
        }
    }

    /// Debug level with targets, for `-v`.
    #[must_use]
    pub const fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Compact,
            timestamps: true,
            target: true,
            spans: false,
            colors: true,
        }
    }

    /// Everything, for `-vv` and beyond.
    #[must_use]
    pub const fn trace() -> Self {
        Self {
            level: LogLevel::Trace,
            format: LogFormat::Full,
            timestamps: true,
            target: true,
            spans: true,
            colors: true,
        }
    }

    /// Pick a preset from the global CLI flags. `quiet` wins over `verbose`.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8, colors: bool) -> Self {
        let config = if quiet {
            Self::quiet()
        } else {
            match verbose {
                0 => Self::default(),
                1 => Self::verbose(),
                _ => Self::trace(),
            }
        };
        Self { colors, ..config }
    }

    /// Filter directive used when `RUST_LOG` is unset.
    #[must_use]
    pub fn filter_directive(&self) -> String {
        format!("{LOG_TARGET}={}", self.level.to_filter_string())
    }
}

impl LogLevel {
    const fn to_filter_string(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
            Self::Off => "off",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" | "e" => Ok(Self::Error),
            "warn" | "warning" | "w" => Ok(Self::Warn),
            "info" | "i" => Ok(Self::Info),
            "debug" | "d" => Ok(Self::Debug),
            "trace" | "t" => Ok(Self::Trace),
            "off" | "none" | "quiet" => Ok(Self::Off),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: &LogConfig) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.filter_directive())
    };

    let span_events = if config.spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    match (config.format, config.timestamps) {
        (LogFormat::Compact, true) => {
            let layer = fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_ansi(config.colors)
                .with_target(config.target)
                .with_span_events(span_events);
            registry.with(layer).try_init().ok();
        }
        (LogFormat::Compact, false) => {
            let layer = fmt::layer()
                .compact()
                .without_time()
                .with_writer(std::io::stderr)
                .with_ansi(config.colors)
                .with_target(config.target)
                .with_span_events(span_events);
            registry.with(layer).try_init().ok();
        }
        (LogFormat::Full, _) => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(config.colors)
                .with_target(config.target)
                .with_span_events(span_events)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true);
            registry.with(layer).try_init().ok();
        }
    }
}

/// Logs the start and end of a long-running step, such as one archive.
pub struct OperationGuard {
    name: String,
    start: Instant,
}

impl OperationGuard {
    /// Start tracking an operation.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        tracing::info!(operation = %name, "Starting operation");
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Complete the operation successfully.
    pub fn complete(self) {
        tracing::info!(
            operation = %self.name,
            duration_ms = self.start.elapsed().as_millis(),
            "Operation completed"
        );
    }

    /// Mark the operation as failed.
    pub fn fail(self, error: &dyn std::error::Error) {
        tracing::error!(
            operation = %self.name,
            duration_ms = self.start.elapsed().as_millis(),
            error = %error,
            "Operation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("error".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("D".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("none".parse::<LogLevel>().unwrap(), LogLevel::Off);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_from_flags() {
        assert_eq!(LogConfig::from_flags(false, 0, true).level, LogLevel::Warn);
        assert_eq!(LogConfig::from_flags(false, 1, true).level, LogLevel::Debug);
        assert_eq!(LogConfig::from_flags(false, 3, true).level, LogLevel::Trace);
        assert_eq!(LogConfig::from_flags(true, 2, true).level, LogLevel::Error);
        assert!(!LogConfig::from_flags(false, 0, false).colors);
    }

    #[test]
    fn test_presets_pick_format() {
        assert_eq!(LogConfig::default().format, LogFormat::Compact);
        assert_eq!(LogConfig::from_flags(false, 1, true).format, LogFormat::Compact);
        assert_eq!(LogConfig::from_flags(false, 2, true).format, LogFormat::Full);
        assert!(LogConfig::trace().spans);
    }

    #[test]
    fn test_filter_directive_targets_crate() {
        assert_eq!(
            LogConfig::verbose().filter_directive(),
            "tweet_loader=debug"
        );
        assert_eq!(LogConfig::quiet().filter_directive(), "tweet_loader=error");
    }
}
