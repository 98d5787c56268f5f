//! Resilience
//!
//! Retry and renewal handling for REST calls.
//!
//! This module provides:
//!
//! - **Retry**: Failure classification and linear-backoff retry decisions
//! - **Call Wrapper**: Executes operations with retry and single-flight renewal

pub mod call;
pub mod retry;

// Retry
pub use retry::{
    classify, decide, FailureClass, RetryDecision, RetryPolicy, RetryStats, DEFAULT_RETRY_POLICY,
};

// Call Wrapper
pub use call::{CallAttempt, CallWrapper};
