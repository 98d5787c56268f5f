//! Copy `date1` into `dateAdded` on Legitimate Interest records.

use std::process::ExitCode;

use bullhorn_sync::jobs::{legitimate_interest, run_script, JobContext, ENV_FILE};
use bullhorn_sync::prompt::StdinPrompter;

#[tokio::main]
async fn main() -> ExitCode {
    run_script("update-legitimate-interest-date-added", async {
        let ctx = JobContext::load(ENV_FILE).await?;
        legitimate_interest::update_legitimate_interest_date_added(&ctx, &StdinPrompter).await
    })
    .await
}
