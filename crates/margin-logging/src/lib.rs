//! Structured logging for the Margin annotation client
//!
//! Every crate in the workspace logs through `tracing`. This crate installs
//! the subscriber that decides where those events go.
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines on the console (default)
//! - **Pretty Console**: Human-readable output for development
//! - **Log Files**: Daily, hourly or single-file output via tracing-appender
//! - **Per-target Levels**: `RUST_LOG` style overrides from config
//!
//! # Quick Start
//!
//! ```ignore
//! use margin_logging::{LogConfig, MarginSubscriberBuilder};
//!
//! // JSONL to console
//! MarginSubscriberBuilder::new().init();
//!
//! // Development mode with pretty output
//! MarginSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```

pub mod config;
pub mod layers;

pub use config::{ConsoleConfig, ConsoleFormat, JsonFields, LogConfig, LogFile, LogRotation};
pub use tracing_appender::non_blocking::WorkerGuard;

use thiserror::Error;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt};

use crate::layers::{BoxedLayer, console_layer, file_writer, jsonl_layer};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file: {0}")]
    File(#[from] std::io::Error),

    #[error("Invalid filter directive: {0}")]
    InvalidDirective(String),

    #[error("Global subscriber already set: {0}")]
    Init(#[from] TryInitError),
}

/// Result type alias for logging setup
pub type LoggingResult<T> = Result<T, LoggingError>;

/// Builder for configuring and initializing the Margin logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
pub struct MarginSubscriberBuilder {
    config: LogConfig,
}

impl MarginSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: LogFile) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Override the level for one target
    pub fn with_target_level(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.config.targets.insert(target.into(), level.into());
        self
    }

    fn env_filter(&self) -> LoggingResult<EnvFilter> {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.level));
        for directive in self.config.target_directives() {
            let parsed = directive
                .parse()
                .map_err(|_| LoggingError::InvalidDirective(directive.clone()))?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }

    /// Try to initialize the subscriber globally
    ///
    /// The returned guard keeps the file writer alive; drop it only at exit.
    pub fn try_init(self) -> LoggingResult<Option<WorkerGuard>> {
        let filter = self.env_filter()?;

        let mut outputs: Vec<BoxedLayer<Registry>> = Vec::new();
        if self.config.console.enabled {
            outputs.push(console_layer(&self.config.console, &self.config.json));
        }

        let mut guard = None;
        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            outputs.push(jsonl_layer(writer, &self.config.json));
            guard = Some(file_guard);
        }

        Registry::default().with(outputs).with(filter).try_init()?;
        Ok(guard)
    }

    /// Initialize the subscriber globally, reporting failure on stderr
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: logging not initialized: {}", e);
                None
            }
        }
    }
}

impl Default for MarginSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() {
    MarginSubscriberBuilder::new().init();
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() {
    MarginSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init();
}

/// Initialize logging for testing (minimal output)
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_testing() {
    let _ = MarginSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
