// dbpull/src/runner/mod.rs
#[cfg(test)]
pub(crate) mod recording;

use std::future;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::commands::CommandLine;
use crate::errors::{AppError, Result};
use crate::utils::find_executable;

/// Exit code and captured streams of a finished command.
///
/// Streams that were passed through to the terminal are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes command text produced by [`crate::commands`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs a command to completion. In verbose mode its output streams to
    /// the terminal, otherwise stdout is discarded and stderr kept.
    async fn run(&self, command: &CommandLine, verbose: bool) -> Result<CommandOutput>;

    /// Runs a command and collects its stdout.
    async fn capture(&self, command: &CommandLine) -> Result<CommandOutput>;

    /// Fails with [`AppError::MissingTool`] for the first tool not on PATH.
    fn ensure_available(&self, tools: &[&str]) -> Result<()>;
}

/// Runs commands through `bash -o pipefail -c`, so a failure anywhere in a
/// pipeline is reported as the pipeline's status.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
}

impl ShellRunner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            shell: find_executable("bash")?,
        })
    }

    async fn execute(&self, command: &CommandLine, stdout: Stdio, stderr: Stdio) -> Result<CommandOutput> {
        self.execute_until(command, stdout, stderr, interrupted()).await
    }

    /// Runs `command` unless `cancel` resolves first.
    async fn execute_until<F>(
        &self,
        command: &CommandLine,
        stdout: Stdio,
        stderr: Stdio,
        cancel: F,
    ) -> Result<CommandOutput>
    where
        F: Future<Output = ()>,
    {
        debug!(command = %command, "executing");

        let child = Command::new(&self.shell)
            .arg("-o")
            .arg("pipefail")
            .arg("-c")
            .arg(command.as_str())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the wait future on cancel drops the child, which kills it.
        tokio::select! {
            output = child.wait_with_output() => {
                let output = output?;
                debug!(status = ?output.status.code(), "command finished");
                Ok(CommandOutput {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            () = cancel => {
                Err(AppError::Cancelled(format!("interrupted while running: {}", command)))
            }
        }
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C; running commands will not be interrupted");
        future::pending::<()>().await;
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &CommandLine, verbose: bool) -> Result<CommandOutput> {
        if verbose {
            self.execute(command, Stdio::inherit(), Stdio::inherit()).await
        } else {
            self.execute(command, Stdio::null(), Stdio::piped()).await
        }
    }

    async fn capture(&self, command: &CommandLine) -> Result<CommandOutput> {
        self.execute(command, Stdio::piped(), Stdio::piped()).await
    }

    fn ensure_available(&self, tools: &[&str]) -> Result<()> {
        for tool in tools {
            let path = find_executable(tool)?;
            debug!(tool = %tool, path = %path.display(), "found executable");
        }
        Ok(())
    }
}
