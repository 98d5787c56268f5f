//! Jobs
//!
//! Candidate maintenance scripts. Each binary in `src/bin/` is a thin wrapper
//! around one function here.
//!
//! Exit codes: `0` when finished (stopping early on Ctrl+C included), `1` on
//! a fatal or unclassified error, `2` when the operator declines the
//! confirmation prompt.

pub mod context;
pub mod cv_dates;
pub mod legitimate_interest;
pub mod onboarding;
pub mod swap_dates;

use std::future::Future;
use std::process::ExitCode;

use crate::error::BullhornResult;
use crate::runner::BatchSummary;
use crate::telemetry::{init_logging, LoggingConfig};

pub use context::JobContext;

/// Env file read from the working directory.
pub const ENV_FILE: &str = ".env";

/// Entity every job works on.
pub const CANDIDATE: &str = "Candidate";

/// How a job ended, short of an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(BatchSummary),
    /// The operator answered anything but `y`.
    Declined,
}

impl JobOutcome {
    /// Completed with nothing to count.
    pub fn done() -> Self {
        Self::Completed(BatchSummary::default())
    }
}

/// Process exit code for a job result.
pub fn exit_code(result: &BullhornResult<JobOutcome>) -> u8 {
    match result {
        Ok(JobOutcome::Completed(_)) => 0,
        Ok(JobOutcome::Declined) => 2,
        Err(_) => 1,
    }
}

/// Set up logging, run `job` and map its result to an exit code.
pub async fn run_script<Fut>(name: &str, job: Fut) -> ExitCode
where
    Fut: Future<Output = BullhornResult<JobOutcome>>,
{
    let guards = match init_logging(&LoggingConfig::default()) {
        Ok(guards) => Some(guards),
        Err(error) => {
            eprintln!("Failed to initialise logging: {}", error);
            None
        }
    };

    tracing::info!(script = name, "Starting");
    let result = job.await;

    match &result {
        Ok(JobOutcome::Completed(summary)) => tracing::info!(
            script = name,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            stopped = summary.stopped,
            "Finished"
        ),
        Ok(JobOutcome::Declined) => tracing::warn!(script = name, "Cancelled by operator"),
        Err(error) => tracing::error!(
            script = name,
            error = %error,
            code = error.error_code(),
            "Script failed"
        ),
    }

    drop(guards);
    ExitCode::from(exit_code(&result))
}
