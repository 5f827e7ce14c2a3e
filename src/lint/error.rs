//! Bridge error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::request::LintKind;

#[derive(Debug, Error)]
pub enum LintError {
    #[error("evi executable not found: {}", .0.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "not configured".into()))]
    ToolNotFound(Option<PathBuf>),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("evi exited with status {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("evi did not finish within {0:?}")]
    Timeout(Duration),

    #[error("another evi invocation held the gate for more than {0:?}")]
    GateTimeout(Duration),

    #[error("malformed {kind} output: {reason}")]
    MalformedOutput { kind: LintKind, reason: String },

    #[error("snapshot file error: {0}")]
    Snapshot(#[from] std::io::Error),
}

impl LintError {
    /// Configuration problems: retrying without a config change cannot help.
    pub fn pauses_validation(&self) -> bool {
        matches!(self, LintError::ToolNotFound(_) | LintError::Spawn { .. })
    }

    pub(crate) fn malformed(kind: LintKind, reason: impl Into<String>) -> Self {
        LintError::MalformedOutput {
            kind,
            reason: reason.into(),
        }
    }
}
