//! Bullhorn Types
//!
//! Configuration, credential and record types.

pub mod config;
pub mod records;
pub mod token;

pub use config::*;
pub use records::*;
pub use token::*;
