//! Process invocation: run evi with a timeout and capture its output.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::error::LintError;
use super::request::ToolCommand;

/// Cap on the stderr excerpt kept in error messages.
const MAX_STDERR: usize = 4 * 1024;

/// Captured output of a successful (exit status 0) evi run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs one encoded command. The bridge holds the gate around every call.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, command: &ToolCommand) -> Result<ToolOutput, LintError>;
}

/// Executes evi as a child process.
pub struct ProcessExecutor {
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn truncate(s: &str) -> String {
        if s.len() > MAX_STDERR {
            let mut end = MAX_STDERR;
            while !s.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated)", &s[..end])
        } else {
            s.to_string()
        }
    }
}

#[async_trait]
impl ToolExecutor for ProcessExecutor {
    async fn execute(&self, command: &ToolCommand) -> Result<ToolOutput, LintError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(%command, "running evi");
        let result = tokio::time::timeout(self.timeout, cmd.output()).await;

        match result {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                if output.status.success() {
                    debug!(bytes = stdout.len(), "evi finished");
                    Ok(ToolOutput { stdout, stderr })
                } else {
                    Err(LintError::NonZeroExit {
                        code: output.status.code().unwrap_or(-1),
                        stderr: Self::truncate(stderr.trim()),
                    })
                }
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LintError::ToolNotFound(Some(command.program.clone())))
            }
            Ok(Err(e)) => Err(LintError::Spawn {
                program: command.program.clone(),
                source: e,
            }),
            Err(_) => Err(LintError::Timeout(self.timeout)),
        }
    }
}
