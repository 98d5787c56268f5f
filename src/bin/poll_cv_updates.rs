//! Keep `customDate3` current from the candidate file subscription.

use std::process::ExitCode;

use bullhorn_sync::jobs::{cv_dates, run_script, JobContext, ENV_FILE};

#[tokio::main]
async fn main() -> ExitCode {
    run_script("poll-cv-updates", async {
        let ctx = JobContext::load(ENV_FILE).await?;
        cv_dates::poll_cv_updates(&ctx, cv_dates::POLL_INTERVAL).await
    })
    .await
}
