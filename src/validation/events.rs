//! Validation events: broadcast channel for editor front-ends.
//!
//! Best-effort delivery: a subscriber that falls behind gets `Lagged` and
//! should re-read the [`DiagnosticCollection`](super::DiagnosticCollection).

use std::path::PathBuf;

use lsp_types::Diagnostic;

#[derive(Debug, Clone)]
pub enum ValidationEvent {
    /// New diagnostics for the files reported while checking `document`.
    /// Files that no longer have diagnostics appear with an empty list.
    Published {
        document: PathBuf,
        files: Vec<(PathBuf, Vec<Diagnostic>)>,
    },
    /// Diagnostics for these files were removed.
    Cleared { files: Vec<PathBuf> },
    /// A user-facing message. `open_settings` offers a jump to the
    /// executable setting.
    ShowMessage { message: String, open_settings: bool },
    /// Validation stopped until the executable setting changes.
    Paused,
    /// Validation resumed after a configuration change.
    Resumed,
}
