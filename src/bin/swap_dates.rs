//! Swap `date1`/`date2` on candidate custom objects.

use std::process::ExitCode;

use bullhorn_sync::jobs::{run_script, swap_dates, JobContext, ENV_FILE};
use bullhorn_sync::prompt::StdinPrompter;

#[tokio::main]
async fn main() -> ExitCode {
    run_script("swap-dates", async {
        let ctx = JobContext::load(ENV_FILE).await?;
        swap_dates::swap_dates(&ctx, &StdinPrompter).await
    })
    .await
}
