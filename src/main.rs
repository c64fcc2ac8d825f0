//! Database pull tool
//!
//! Replicates an application's server database onto the local development
//! database over ssh, streaming the dump straight into the local restore.

// dbpull/src/main.rs
mod commands;
mod config;
mod credentials;
mod errors;
mod runner;
mod sync;
mod utils;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use config::{AppConfig, DEFAULT_CONFIG_FILE};
use runner::ShellRunner;
use std::path::PathBuf;
use std::process::ExitCode;
use sync::{MigrationStatus, PullOptions};

/// Command-line interface
#[derive(Parser, Debug)]
#[command(name = "dbpull")]
#[command(about = "Sync a MySQL or PostgreSQL database from a server to localhost")]
#[command(version)]
struct Cli {
    /// Path to the application profile configuration
    #[arg(short, long, env = "DBPULL_CONFIG", default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Server environment to pull from
    #[arg(short, long, env = "DBPULL_ENV", default_value = "production", global = true)]
    environment: String,

    /// Stream command output and increase log detail (-vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync the server database to the local database
    Pull {
        /// Run migrations after the sync
        #[arg(short, long, default_value_t = true, action = ArgAction::Set)]
        migrate: bool,
    },
    /// Sync the local database to the server
    Push,
}

/// Main entry point for the pull tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = utils::logging::init_logging(cli.verbose, cli.quiet) {
        eprintln!("⚠️ {}", e);
    }

    match run_app(cli).await {
        Ok(true) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when the run finished but left follow-up work for the operator.
async fn run_app(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Pull { migrate } => {
            let app_config = AppConfig::load_from_json(&cli.config).with_context(|| {
                format!(
                    "Failed to load application configuration from {}",
                    cli.config.display()
                )
            })?;
            let runner = ShellRunner::new()?;
            let options = PullOptions {
                migrate,
                verbose: cli.verbose > 0,
            };

            let report = sync::run_pull_flow(&app_config, &cli.environment, &options, &runner)
                .await
                .context("Pull process failed")?;

            match report.migrations {
                MigrationStatus::Failed { code, command } => {
                    eprintln!(
                        "⚠️ Data was synced, but migrations failed (status {:?}). Re-run them with: {}",
                        code, command
                    );
                    Ok(false)
                }
                MigrationStatus::Completed => {
                    println!("✓ Migrations completed");
                    Ok(true)
                }
                MigrationStatus::Skipped => Ok(true),
            }
        }
        Commands::Push => {
            println!("⚠️ Pushing a local database to the server is pending implementation.");
            Ok(true)
        }
    }
}
