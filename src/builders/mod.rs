//! Builders
//!
//! Fluent configuration builder and env-file loading.

pub mod config;
pub mod env;

pub use config::{bullhorn_config, BullhornConfigBuilder};
pub use env::{keys, EnvSettings};
