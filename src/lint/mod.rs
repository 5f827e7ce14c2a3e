//! Bridge to the `evi` compiler's lint mode.
//!
//! A request is encoded against a snapshot of the document's unsaved text,
//! evi runs behind the shared [`SerializationGate`], and its stdout is
//! stripped of color codes and decoded into a [`LintResult`].

pub mod ansi;
pub mod decode;
pub mod error;
pub mod exec;
pub mod gate;
pub mod position;
pub mod request;

use std::sync::Arc;
use std::time::Duration;

use lsp_types::Position;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::document::Document;

pub use decode::{
    FunctionSignature, LintDiagnostic, LintResult, RelatedNote, Severity, Variable,
};
pub use error::LintError;
pub use exec::{ProcessExecutor, ToolExecutor, ToolOutput};
pub use gate::{SerializationGate, DEFAULT_GATE_WAIT};
pub use position::SourcePosition;
pub use request::{LintKind, LintRequest, Snapshot, ToolCommand, ToolSettings};

/// Shared entry point for every feature that needs evi.
pub struct LintBridge {
    settings: RwLock<ToolSettings>,
    gate: SerializationGate,
    executor: Arc<dyn ToolExecutor>,
}

impl LintBridge {
    pub fn new(settings: ToolSettings, gate_wait: Duration) -> Self {
        let executor = Arc::new(ProcessExecutor::new(settings.timeout));
        Self::with_executor(settings, gate_wait, executor)
    }

    pub fn with_executor(
        settings: ToolSettings,
        gate_wait: Duration,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            settings: RwLock::new(settings),
            gate: SerializationGate::new(gate_wait),
            executor,
        }
    }

    pub async fn settings(&self) -> ToolSettings {
        self.settings.read().await.clone()
    }

    /// Swap in new tool settings. Affects requests built after this returns.
    ///
    /// The process timeout is fixed when the bridge is built.
    pub async fn reconfigure(&self, settings: ToolSettings) {
        debug!(executable = ?settings.executable, "bridge reconfigured");
        *self.settings.write().await = settings;
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Run one evi query for `document`.
    pub async fn run(
        &self,
        document: &Document,
        kind: LintKind,
        cursor: Option<Position>,
    ) -> Result<LintResult, LintError> {
        let settings = self.settings().await;
        let program = settings
            .executable
            .clone()
            .ok_or(LintError::ToolNotFound(None))?;
        let request = LintRequest::new(document, kind, cursor, &settings);

        let output = {
            let _permit = self.gate.acquire().await?;
            // Written under the gate so the command sees the latest text.
            let snapshot = Snapshot::write(document)?;
            let command = request.command(&program, snapshot.path());
            let output = self.executor.execute(&command).await;
            let snapshot_path = snapshot.path().to_path_buf();
            snapshot.remove();
            output.map(|out| (out, snapshot_path))
        };

        let (output, snapshot_path) = output.map_err(|e| {
            warn!(%kind, document = %document.path.display(), "evi failed: {e}");
            e
        })?;

        let stdout = ansi::strip_ansi(&output.stdout);
        let mut result = decode::decode(kind, &stdout).map_err(|e| {
            warn!(%kind, document = %document.path.display(), "{e}");
            e
        })?;
        result.remap_path(&snapshot_path, &document.path);
        Ok(result)
    }

    /// [`run`](Self::run) with failures logged and turned into "no answer".
    pub async fn query(
        &self,
        document: &Document,
        kind: LintKind,
        cursor: Option<Position>,
    ) -> Option<LintResult> {
        match self.run(document, kind, cursor).await {
            Ok(result) => Some(result),
            Err(e) => {
                debug!(%kind, "no answer: {e}");
                None
            }
        }
    }
}
