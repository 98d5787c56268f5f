//! Retry Logic
//!
//! Failure classification and retry decisions for authenticated REST calls.
//! Everything here is pure; the loop that acts on a decision lives in
//! [`crate::resilience::call`].

use std::time::Duration;

use crate::error::BullhornError;

/// Retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts allowed per call while failures are transient.
    pub max_transient_attempts: u32,
    /// Backoff unit; the n-th transient failure waits `n * base_delay`.
    pub base_delay: Duration,
    /// Authentication failures at which the wrapper gives up with a fatal
    /// error, counted both within one call and consecutively process-wide.
    pub max_consecutive_auth_failures: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        DEFAULT_RETRY_POLICY
    }
}

/// Default retry policy.
pub const DEFAULT_RETRY_POLICY: RetryPolicy = RetryPolicy {
    max_transient_attempts: 6,
    base_delay: Duration::from_millis(1000),
    max_consecutive_auth_failures: 6,
};

impl RetryPolicy {
    /// Linear backoff for the given transient failure count.
    pub fn backoff(&self, transient_failures: u32) -> Duration {
        self.base_delay.saturating_mul(transient_failures)
    }
}

/// How a failed attempt is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// Timeout, DNS failure, connection reset.
    Transient,
    /// HTTP 401 or an `invalid_token` payload.
    AuthenticationExpired,
    /// Anything else.
    Unclassified,
}

/// Classify an error. Transient wins over authentication.
pub fn classify(error: &BullhornError) -> FailureClass {
    if error.is_transient() {
        FailureClass::Transient
    } else if error.needs_renewal() {
        FailureClass::AuthenticationExpired
    } else {
        FailureClass::Unclassified
    }
}

/// What the call wrapper does next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep, then run the operation again.
    RetryAfter(Duration),
    /// Renew credentials, then run the operation again.
    RenewAndRetry,
    /// Transient budget spent; surface the last error.
    Exhausted,
    /// Consecutive authentication failures reached the threshold.
    AbortAuthentication,
    /// Not retryable; surface the error as-is.
    Propagate,
}

/// Decide the next step.
///
/// `transient_failures` counts transient failures of this call including the
/// current one. `auth_failures` is the larger of this call's renewals and the
/// process-wide consecutive count, including the current failure when it is
/// an authentication failure. A server-supplied `retry_after` replaces the
/// linear backoff.
pub fn decide(
    policy: &RetryPolicy,
    class: FailureClass,
    transient_failures: u32,
    auth_failures: u32,
    retry_after: Option<Duration>,
) -> RetryDecision {
    match class {
        FailureClass::Transient => {
            if transient_failures >= policy.max_transient_attempts {
                RetryDecision::Exhausted
            } else {
                RetryDecision::RetryAfter(
                    retry_after.unwrap_or_else(|| policy.backoff(transient_failures)),
                )
            }
        }
        FailureClass::AuthenticationExpired => {
            if auth_failures >= policy.max_consecutive_auth_failures {
                RetryDecision::AbortAuthentication
            } else {
                RetryDecision::RenewAndRetry
            }
        }
        FailureClass::Unclassified => RetryDecision::Propagate,
    }
}

/// Retry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub total_attempts: u64,
    pub transient_retries: u64,
    pub renewals_requested: u64,
    pub failed_calls: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{create_error_from_response, ApiError, NetworkError};

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_transient_attempts, 6);
        assert_eq!(policy.max_consecutive_auth_failures, 6);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(3), Duration::from_secs(3));
    }

    #[test]
    fn test_classify() {
        let timeout: BullhornError = NetworkError::Timeout {
            timeout: Duration::from_secs(30),
        }
        .into();
        assert_eq!(classify(&timeout), FailureClass::Transient);

        let dns: BullhornError = NetworkError::DnsResolution {
            message: "EAI_AGAIN".to_string(),
        }
        .into();
        assert_eq!(classify(&dns), FailureClass::Transient);

        assert_eq!(
            classify(&create_error_from_response(401, "")),
            FailureClass::AuthenticationExpired
        );
        assert_eq!(
            classify(&create_error_from_response(
                400,
                r#"{"error":"invalid_token"}"#
            )),
            FailureClass::AuthenticationExpired
        );

        let api: BullhornError = ApiError::Status {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(classify(&api), FailureClass::Unclassified);
    }

    #[test]
    fn test_decide_transient() {
        let policy = RetryPolicy::default();
        assert_eq!(
            decide(&policy, FailureClass::Transient, 2, 0, None),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            decide(&policy, FailureClass::Transient, 6, 0, None),
            RetryDecision::Exhausted
        );
    }

    #[test]
    fn test_decide_honors_retry_after() {
        let policy = RetryPolicy::default();
        assert_eq!(
            decide(
                &policy,
                FailureClass::Transient,
                1,
                0,
                Some(Duration::from_secs(7))
            ),
            RetryDecision::RetryAfter(Duration::from_secs(7))
        );
        assert_eq!(
            decide(
                &policy,
                FailureClass::Transient,
                6,
                0,
                Some(Duration::from_secs(7))
            ),
            RetryDecision::Exhausted
        );
    }

    #[test]
    fn test_decide_authentication() {
        let policy = RetryPolicy::default();
        assert_eq!(
            decide(&policy, FailureClass::AuthenticationExpired, 0, 1, None),
            RetryDecision::RenewAndRetry
        );
        assert_eq!(
            decide(&policy, FailureClass::AuthenticationExpired, 5, 5, None),
            RetryDecision::RenewAndRetry
        );
        assert_eq!(
            decide(&policy, FailureClass::AuthenticationExpired, 0, 6, None),
            RetryDecision::AbortAuthentication
        );
    }

    #[test]
    fn test_decide_unclassified() {
        let policy = RetryPolicy::default();
        assert_eq!(
            decide(&policy, FailureClass::Unclassified, 0, 0, None),
            RetryDecision::Propagate
        );
    }
}
