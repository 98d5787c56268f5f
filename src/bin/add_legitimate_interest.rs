//! Add a Legitimate Interest record to recent candidates missing one.

use std::process::ExitCode;

use bullhorn_sync::jobs::{legitimate_interest, run_script, JobContext, ENV_FILE};
use bullhorn_sync::prompt::StdinPrompter;

#[tokio::main]
async fn main() -> ExitCode {
    run_script("add-legitimate-interest", async {
        let since = legitimate_interest::default_since()?;
        let ctx = JobContext::load(ENV_FILE).await?;
        legitimate_interest::add_legitimate_interest(&ctx, &StdinPrompter, since).await
    })
    .await
}
