// dbpull/src/sync/mod.rs
pub(crate) mod logic;

use anyhow::Result;

use crate::config::AppConfig;
use crate::runner::CommandRunner;

pub use logic::{MigrationStatus, PullOptions, PullReport};

/// Public entry point for the pull process.
/// Resolves the server profile for `environment` and runs the pull workflow.
pub async fn run_pull_flow(
    app_config: &AppConfig,
    environment: &str,
    options: &PullOptions,
    runner: &dyn CommandRunner,
) -> Result<PullReport> {
    let profile = app_config.load_profile(environment)?;
    println!(
        "Pulling {} database from {}",
        profile.environment,
        profile.ssh_target()
    );

    logic::perform_pull_orchestration(app_config, &profile, options, runner).await
}
