//! Core Components
//!
//! HTTP transport shared by the auth flows and the REST client.

pub mod transport;

pub use transport::*;
