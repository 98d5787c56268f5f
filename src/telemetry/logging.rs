//! Logging
//!
//! Console output plus two log files per run: one with every event and one
//! with warnings and errors only.

use chrono::{DateTime, Local};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::error::{BullhornError, BullhornResult, ConfigurationError};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Logging setup.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Directory the log files are created in.
    pub directory: PathBuf,
    /// File name prefix, `script` gives `script-<ts>.log`.
    pub file_prefix: String,
    /// Filter when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Also log to the console.
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_prefix: "script".to_string(),
            default_filter: DEFAULT_LOG_FILTER.to_string(),
            console: true,
        }
    }
}

impl LoggingConfig {
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }
}

/// Flush guards for the file writers. Hold until the end of `main`.
#[must_use = "log files stop receiving events once the guards are dropped"]
pub struct LogGuards {
    _all: WorkerGuard,
    _errors: WorkerGuard,
    /// Path of the full log.
    pub log_file: PathBuf,
    /// Path of the warnings-and-errors log.
    pub error_file: PathBuf,
}

/// File names for a run started at `started`.
pub fn log_file_names(prefix: &str, started: DateTime<Local>) -> (String, String) {
    let stamp = started.format("%Y-%m-%dT%H-%M-%S");
    (
        format!("{}-{}.log", prefix, stamp),
        format!("{}-errors-{}.log", prefix, stamp),
    )
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> BullhornResult<LogGuards> {
    let failed = |message: String| {
        BullhornError::Configuration(ConfigurationError::InvalidValue {
            field: "logging".to_string(),
            message,
        })
    };

    std::fs::create_dir_all(&config.directory).map_err(|e| failed(e.to_string()))?;

    let (all_name, error_name) = log_file_names(&config.file_prefix, Local::now());
    let (all_writer, all_guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::never(&config.directory, &all_name),
    );
    let (error_writer, error_guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::never(&config.directory, &error_name),
    );

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let console = config
        .console
        .then(|| fmt::layer().with_target(false).with_ansi(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(fmt::layer().with_writer(all_writer).with_ansi(false))
        .with(
            fmt::layer()
                .with_writer(error_writer)
                .with_ansi(false)
                .with_filter(LevelFilter::WARN),
        )
        .try_init()
        .map_err(|e| failed(e.to_string()))?;

    Ok(LogGuards {
        _all: all_guard,
        _errors: error_guard,
        log_file: config.directory.join(all_name),
        error_file: config.directory.join(error_name),
    })
}
