//! Print an authorization code for the configured API user.

use std::path::Path;
use std::process::ExitCode;

use bullhorn_sync::jobs::{onboarding, run_script, ENV_FILE};

#[tokio::main]
async fn main() -> ExitCode {
    run_script("auth-code", onboarding::run_auth_code(Path::new(ENV_FILE))).await
}
