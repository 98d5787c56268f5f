//! Fill `customDate3` from file attachments where it is empty.

use std::process::ExitCode;

use bullhorn_sync::jobs::{cv_dates, run_script, JobContext, ENV_FILE};

#[tokio::main]
async fn main() -> ExitCode {
    run_script("backfill-cv-date", async {
        let ctx = JobContext::load(ENV_FILE).await?;
        cv_dates::backfill_cv_date(&ctx).await
    })
    .await
}
