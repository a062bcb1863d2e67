//! Logging setup shared by the library consumers
//!
//! Output goes to stderr in one of three formats. The level comes from
//! `RUST_LOG` when set, otherwise from the configured level. Chatty
//! dependencies (sqlx statement logging, the HTTP stack) are held at `warn`
//! unless the filter names them explicitly.
//!
//! ```no_run
//! use libtrinity::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "info").init();
//!
//! // Or read TRINITY_LOG_FORMAT / TRINITY_LOG_LEVEL
//! libtrinity::logging::init_default();
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

const QUIET_DEPENDENCIES: &str = "sqlx=warn,hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain text, no colors
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line with colors, for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: impl Into<String>) -> Self {
        Self {
            format,
            level: level.into(),
        }
    }

    /// Read `TRINITY_LOG_FORMAT` and `TRINITY_LOG_LEVEL`, falling back to text at info
    pub fn from_env() -> Self {
        let format = std::env::var("TRINITY_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let level = std::env::var("TRINITY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        Self::new(format, level)
    }

    /// Raise the level to debug when `verbose` is set
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.level = "debug".to_string();
        }
        self
    }

    /// Directive string used when `RUST_LOG` is not set
    pub fn directives(&self) -> String {
        format!("{},{}", self.level, QUIET_DEPENDENCIES)
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }

    /// Install the global subscriber
    ///
    /// Returns `false` if a subscriber was already installed, which happens
    /// when tests or embedding applications initialise logging first.
    pub fn init(&self) -> bool {
        let filter = self.filter();

        let result = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(true)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .with_ansi(false)
                .try_init(),
        };

        result.is_ok()
    }
}

/// Initialise logging from the `TRINITY_LOG_*` environment variables
pub fn init_default() -> bool {
    LoggingConfig::from_env().init()
}
