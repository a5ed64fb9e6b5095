//! Logging presets
//!
//! A [`LogConfig`] says which level to log at, where events go (console,
//! a log file, or both) and how JSON lines are shaped. The presets cover
//! the ways the sidebar engine is run: embedded in a host, during local
//! development, under test, and as a long-lived deployment writing files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Targets that are noisy below `warn` regardless of preset
const QUIET_TARGETS: [&str; 2] = ["tungstenite", "tokio_tungstenite"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level for targets without an override; `RUST_LOG` replaces it
    pub level: String,
    pub console: ConsoleConfig,
    pub file: Option<LogFile>,
    pub json: JsonFields,
    /// Per-target levels, e.g. `margin_stream = "debug"`
    pub targets: BTreeMap<String, String>,
}

impl Default for LogConfig {
    /// `info` as JSON lines on stdout, websocket internals at `warn`
    fn default() -> Self {
        let targets = QUIET_TARGETS
            .iter()
            .map(|target| (target.to_string(), "warn".to_string()))
            .collect();
        Self {
            level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: None,
            json: JsonFields::default(),
            targets,
        }
    }
}

impl LogConfig {
    /// Pretty `debug` output.
    ///
    /// The window tracker logs every recalculation at `debug`, so
    /// `margin_threads` stays at `info` unless asked for.
    pub fn development() -> Self {
        Self::default()
            .with_level("debug")
            .with_console(ConsoleConfig::pretty(true))
            .with_target("margin_threads", "info")
    }

    /// Daily JSON-lines files under `log_dir`, nothing on the console
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            console: ConsoleConfig::disabled(),
            ..Self::default()
        }
        .with_file(LogFile::daily(log_dir))
    }

    /// Only warnings, uncoloured so they read cleanly in captured output
    pub fn testing() -> Self {
        Self::default()
            .with_level("warn")
            .with_console(ConsoleConfig::pretty(false))
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_console(mut self, console: ConsoleConfig) -> Self {
        self.console = console;
        self
    }

    pub fn with_file(mut self, file: LogFile) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.targets.insert(target.into(), level.into());
        self
    }

    /// `target=level` filter directives, ordered by target
    pub fn target_directives(&self) -> Vec<String> {
        self.targets
            .iter()
            .map(|(target, level)| format!("{}={}", target, level))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConsoleFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: ConsoleFormat,
    /// Colour codes; only honoured by the pretty format
    pub ansi: bool,
}

impl ConsoleConfig {
    pub fn pretty(ansi: bool) -> Self {
        Self {
            enabled: true,
            format: ConsoleFormat::Pretty,
            ansi,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: ConsoleFormat::Json,
            ansi: false,
        }
    }
}

/// Where log files are written and how they roll over
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFile {
    pub directory: PathBuf,
    /// File name stem; rolling files get a date suffix
    pub prefix: String,
    pub rotation: LogRotation,
}

impl LogFile {
    pub fn daily(directory: PathBuf) -> Self {
        Self {
            directory,
            prefix: "margin".to_string(),
            rotation: LogRotation::Daily,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    /// One `<prefix>.log`, truncated when logging starts
    Single,
}

/// Which extras each JSON line carries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFields {
    /// Event fields at the top level instead of under `fields`
    pub flatten: bool,
    pub spans: bool,
    pub thread: bool,
    /// Source file and line
    pub location: bool,
}

impl Default for JsonFields {
    fn default() -> Self {
        Self {
            flatten: true,
            spans: true,
            thread: false,
            location: true,
        }
    }
}
