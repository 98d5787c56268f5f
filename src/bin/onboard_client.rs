//! Collect tenant settings, authenticate, and write `.env`.

use std::path::Path;
use std::process::ExitCode;

use bullhorn_sync::jobs::{onboarding, run_script, ENV_FILE};
use bullhorn_sync::prompt::StdinPrompter;

#[tokio::main]
async fn main() -> ExitCode {
    run_script(
        "onboard-client",
        onboarding::onboard_client(Path::new(ENV_FILE), &StdinPrompter),
    )
    .await
}
