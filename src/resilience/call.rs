//! Call Wrapper
//!
//! Runs a REST operation with the current credentials and recovers from
//! transient and authentication failures within the bounds of a
//! [`RetryPolicy`].

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{AuthenticationError, BullhornResult};
use crate::resilience::retry::{
    classify, decide, FailureClass, RetryDecision, RetryPolicy, RetryStats,
};
use crate::token::RenewalCoordinator;
use crate::types::CredentialSet;

/// Bookkeeping for one `call`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallAttempt {
    /// Executions so far, including the current one.
    pub number: u32,
    /// Transient failures so far.
    pub transient_failures: u32,
    /// Authentication failures so far, each followed by a renewal.
    pub auth_failures: u32,
    pub last_failure: Option<FailureClass>,
}

/// Consecutive authentication failures across the process. A storm of
/// failures against one credential generation counts once.
#[derive(Debug, Default)]
struct AuthFailures {
    count: u32,
    last_generation: Option<u64>,
}

/// Authenticated call wrapper.
pub struct CallWrapper {
    coordinator: Arc<RenewalCoordinator>,
    policy: RetryPolicy,
    auth_failures: Mutex<AuthFailures>,
    stats: Mutex<RetryStats>,
}

impl CallWrapper {
    pub fn new(coordinator: Arc<RenewalCoordinator>, policy: RetryPolicy) -> Self {
        Self {
            coordinator,
            policy,
            auth_failures: Mutex::new(AuthFailures::default()),
            stats: Mutex::new(RetryStats::default()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn coordinator(&self) -> &Arc<RenewalCoordinator> {
        &self.coordinator
    }

    /// Current credentials.
    pub fn credentials(&self) -> Arc<CredentialSet> {
        self.coordinator.store().read()
    }

    pub fn consecutive_auth_failures(&self) -> u32 {
        self.auth_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count
    }

    pub fn stats(&self) -> RetryStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `operation` until it succeeds or a failure is not recoverable.
    ///
    /// `operation` receives the credentials current at the start of each
    /// attempt, so a retry after renewal uses the new session token.
    pub async fn call<T, F, Fut>(&self, operation: F) -> BullhornResult<T>
    where
        F: Fn(Arc<CredentialSet>) -> Fut,
        Fut: Future<Output = BullhornResult<T>>,
    {
        self.run(operation, true).await
    }

    /// Like [`call`](Self::call), but a transient failure is returned
    /// instead of retried.
    ///
    /// For writes that are not idempotent: a timeout or gateway error may
    /// arrive after the server applied the write, so the caller has to check
    /// remote state before sending again. Authentication failures are still
    /// renewed and retried, since a rejected request was never applied.
    pub async fn call_without_transient_retry<T, F, Fut>(&self, operation: F) -> BullhornResult<T>
    where
        F: Fn(Arc<CredentialSet>) -> Fut,
        Fut: Future<Output = BullhornResult<T>>,
    {
        self.run(operation, false).await
    }

    async fn run<T, F, Fut>(&self, operation: F, retry_transient: bool) -> BullhornResult<T>
    where
        F: Fn(Arc<CredentialSet>) -> Fut,
        Fut: Future<Output = BullhornResult<T>>,
    {
        let mut attempt = CallAttempt::default();

        loop {
            let snapshot = self.coordinator.store().snapshot();
            attempt.number += 1;
            self.update_stats(|s| s.total_attempts += 1);

            let error = match operation(snapshot.credentials).await {
                Ok(value) => {
                    self.reset_auth_failures();
                    return Ok(value);
                }
                Err(error) => error,
            };

            let class = classify(&error);
            attempt.last_failure = Some(class);
            if class == FailureClass::Transient && !retry_transient {
                tracing::warn!(error = %error, "Transient error on a non-idempotent call, not retrying");
                self.update_stats(|s| s.failed_calls += 1);
                return Err(error);
            }
            let consecutive = match class {
                FailureClass::Transient => {
                    attempt.transient_failures += 1;
                    self.consecutive_auth_failures()
                }
                FailureClass::AuthenticationExpired => {
                    attempt.auth_failures += 1;
                    self.record_auth_failure(snapshot.generation)
                }
                FailureClass::Unclassified => self.consecutive_auth_failures(),
            };
            // Successes elsewhere reset the process-wide count, so one call
            // that keeps failing is bounded by its own count.
            let auth_failures = consecutive.max(attempt.auth_failures);

            match decide(
                &self.policy,
                class,
                attempt.transient_failures,
                auth_failures,
                error.retry_after(),
            ) {
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        error = %error,
                        attempt = attempt.transient_failures,
                        max_attempts = self.policy.max_transient_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Transient error, retrying"
                    );
                    self.update_stats(|s| s.transient_retries += 1);
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::RenewAndRetry => {
                    tracing::info!(
                        consecutive = auth_failures,
                        generation = snapshot.generation,
                        "Token expired, renewing before retry"
                    );
                    self.update_stats(|s| s.renewals_requested += 1);
                    if let Err(renewal_error) =
                        self.coordinator.renew(snapshot.generation).await
                    {
                        self.update_stats(|s| s.failed_calls += 1);
                        return Err(renewal_error);
                    }
                }
                RetryDecision::Exhausted => {
                    tracing::error!(
                        error = %error,
                        attempts = attempt.number,
                        "Max retries reached"
                    );
                    self.update_stats(|s| s.failed_calls += 1);
                    return Err(error);
                }
                RetryDecision::AbortAuthentication => {
                    tracing::error!(
                        count = auth_failures,
                        "Too many consecutive authentication failures, stopping"
                    );
                    self.update_stats(|s| s.failed_calls += 1);
                    return Err(AuthenticationError::TooManyConsecutiveFailures {
                        count: auth_failures,
                    }
                    .into());
                }
                RetryDecision::Propagate => {
                    tracing::error!(
                        error = %error,
                        code = error.error_code(),
                        "Unhandled error"
                    );
                    self.update_stats(|s| s.failed_calls += 1);
                    return Err(error);
                }
            }
        }
    }

    fn record_auth_failure(&self, generation: u64) -> u32 {
        let mut failures = self
            .auth_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if failures.last_generation != Some(generation) {
            failures.count += 1;
            failures.last_generation = Some(generation);
        }
        failures.count
    }

    fn reset_auth_failures(&self) {
        let mut failures = self
            .auth_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        failures.count = 0;
        failures.last_generation = None;
    }

    fn update_stats(&self, update: impl FnOnce(&mut RetryStats)) {
        update(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }
}
