//! Bring `customDate2` up to the newest attachment date on test candidates.

use std::process::ExitCode;

use bullhorn_sync::jobs::{cv_dates, run_script, JobContext, ENV_FILE};

#[tokio::main]
async fn main() -> ExitCode {
    run_script("last-cv-added", async {
        let ctx = JobContext::load(ENV_FILE).await?;
        cv_dates::last_cv_added(&ctx).await
    })
    .await
}
