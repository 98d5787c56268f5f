//! Telemetry
//!
//! Subscriber setup for the `tracing` events emitted across the crate.

pub mod logging;

// Logging
pub use logging::{init_logging, log_file_names, LogGuards, LoggingConfig, DEFAULT_LOG_FILTER};
