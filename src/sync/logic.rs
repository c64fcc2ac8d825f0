// dbpull/src/sync/logic.rs
use anyhow::{Context, Result};
use std::fmt;
use tracing::{debug, info, warn};

use crate::commands::{self, CommandLine};
use crate::config::{AppConfig, ApplicationProfile};
use crate::credentials::{self, connection_string, template, DbSection};
use crate::errors::AppError;
use crate::runner::CommandRunner;

/// Steps of a pull, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveLocal,
    ResolveRemote,
    RecreateLocal,
    SyncData,
    RunMigrations,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ResolveLocal => "Load local database configuration",
            Stage::ResolveRemote => "Load server database configuration",
            Stage::RecreateLocal => "Drop and recreate local database",
            Stage::SyncData => "Sync server database to local database",
            Stage::RunMigrations => "Run migrations",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullOptions {
    pub migrate: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    Skipped,
    Completed,
    Failed { code: Option<i32>, command: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullReport {
    pub migrations: MigrationStatus,
}

/// Replicates the server database of `profile.environment` into the local
/// development database.
///
/// Both destructive commands are built before either runs, so configuration
/// problems on either side stop the pull while the local database is intact.
pub async fn perform_pull_orchestration(
    app_config: &AppConfig,
    profile: &ApplicationProfile,
    options: &PullOptions,
    runner: &dyn CommandRunner,
) -> Result<PullReport> {
    let local = credentials::load_local_db_config(&app_config.local_database_config)
        .with_context(|| format!("{} failed", Stage::ResolveLocal))?;
    println!("✓ Loaded local database configuration");

    let remote = resolve_remote_db_config(app_config, profile, runner)
        .await
        .with_context(|| format!("{} failed", Stage::ResolveRemote))?;
    println!("✓ Loaded {} server database configuration", profile.environment);

    let recreate = commands::build_recreate(&local)
        .with_context(|| format!("{} failed", Stage::RecreateLocal))?;
    let sync = commands::build_sync(&remote, &local, profile, &app_config.restore_role)
        .with_context(|| format!("{} failed", Stage::SyncData))?;
    let tools = commands::required_tools(&local)?;
    runner
        .ensure_available(&tools)
        .with_context(|| format!("{} failed", Stage::RecreateLocal))?;

    execute(runner, Stage::RecreateLocal, &recreate, options.verbose).await?;
    println!("✓ Dropped and recreated local database");

    execute(runner, Stage::SyncData, &sync, options.verbose).await?;
    println!("✓ Synced {} database to local database", profile.environment);

    let migrations = if options.migrate {
        run_migrations(app_config, runner, options.verbose).await?
    } else {
        MigrationStatus::Skipped
    };

    Ok(PullReport { migrations })
}

async fn resolve_remote_db_config(
    app_config: &AppConfig,
    profile: &ApplicationProfile,
    runner: &dyn CommandRunner,
) -> Result<DbSection> {
    let config_path = profile.remote_file(&app_config.remote_database_config);
    let output = runner
        .capture(&commands::build_remote_read(profile, &config_path))
        .await?;
    if !output.success() {
        return Err(AppError::RemoteFetch {
            what: config_path.clone(),
            detail: format!("command exited with {:?}: {}", output.code, output.stderr.trim()),
        }
        .into());
    }

    let expanded = template::expand(&output.stdout, |name| std::env::var(name).ok())?;
    let section = credentials::parse_document(&expanded, &profile.environment, &config_path)?;

    // A written but empty username is left for command building to reject.
    if section.has("username") {
        return Ok(section);
    }

    info!(
        secrets_file = %app_config.secrets_file,
        "server database.yml has no username; deriving credentials from {}",
        app_config.connection_string_key
    );
    let derived = connection_string::derive(&section, profile, app_config, runner).await?;
    Ok(derived)
}

async fn execute(
    runner: &dyn CommandRunner,
    stage: Stage,
    command: &CommandLine,
    verbose: bool,
) -> Result<()> {
    println!("{}...", stage);
    debug!(%stage, command = %command, "running stage");

    let output = runner
        .run(command, verbose)
        .await
        .with_context(|| format!("{} failed", stage))?;
    if !output.success() {
        return Err(AppError::Execution {
            stage: stage.to_string(),
            command: command.redacted(),
            code: output.code,
            stderr: output.stderr,
        })
        .with_context(|| format!("{} failed", stage));
    }
    Ok(())
}

/// Migrations run after the data is in place; a failure leaves the synced
/// data untouched and can be retried on its own.
async fn run_migrations(
    app_config: &AppConfig,
    runner: &dyn CommandRunner,
    verbose: bool,
) -> Result<MigrationStatus> {
    let command = CommandLine::raw(app_config.migrate_command.as_str());
    println!("{}: {}", Stage::RunMigrations, command);

    let output = runner
        .run(&command, verbose)
        .await
        .with_context(|| format!("{} failed", Stage::RunMigrations))?;
    if output.success() {
        return Ok(MigrationStatus::Completed);
    }

    warn!(code = ?output.code, stderr = %output.stderr.trim(), "migrations failed");
    Ok(MigrationStatus::Failed {
        code: output.code,
        command: command.redacted(),
    })
}
