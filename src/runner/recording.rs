// Test double that scripts command results and remembers every call.
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CommandOutput, CommandRunner};
use crate::commands::CommandLine;
use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallKind {
    Run,
    Capture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub kind: CallKind,
    pub script: String,
    pub verbose: bool,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingRunner {
    responses: Vec<(String, CommandOutput)>,
    missing_tools: Vec<String>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first response whose pattern occurs in a command's text is used;
    /// unmatched commands succeed with no output.
    pub fn respond(mut self, pattern: &str, output: CommandOutput) -> Self {
        self.responses.push((pattern.to_string(), output));
        self
    }

    pub fn respond_stdout(self, pattern: &str, stdout: &str) -> Self {
        self.respond(
            pattern,
            CommandOutput {
                code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        )
    }

    pub fn fail(self, pattern: &str, code: i32, stderr: &str) -> Self {
        self.respond(
            pattern,
            CommandOutput {
                code: Some(code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        )
    }

    pub fn without_tool(mut self, tool: &str) -> Self {
        self.missing_tools.push(tool.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn runs(&self) -> Vec<String> {
        self.scripts(CallKind::Run)
    }

    pub fn captures(&self) -> Vec<String> {
        self.scripts(CallKind::Capture)
    }

    fn scripts(&self, kind: CallKind) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.kind == kind)
            .map(|call| call.script)
            .collect()
    }

    fn record(&self, kind: CallKind, command: &CommandLine, verbose: bool) -> CommandOutput {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Call {
                kind,
                script: command.as_str().to_string(),
                verbose,
            });
        }
        self.responses
            .iter()
            .find(|(pattern, _)| command.as_str().contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or(CommandOutput {
                code: Some(0),
                ..CommandOutput::default()
            })
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandLine, verbose: bool) -> Result<CommandOutput> {
        Ok(self.record(CallKind::Run, command, verbose))
    }

    async fn capture(&self, command: &CommandLine) -> Result<CommandOutput> {
        Ok(self.record(CallKind::Capture, command, false))
    }

    fn ensure_available(&self, tools: &[&str]) -> Result<()> {
        match tools.iter().find(|tool| self.missing_tools.iter().any(|m| m == *tool)) {
            Some(tool) => Err(AppError::MissingTool {
                tool: tool.to_string(),
                source: which::Error::CannotFindBinaryPath,
            }),
            None => Ok(()),
        }
    }
}
