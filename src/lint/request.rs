//! Request encoding: lint kinds, snapshot files, and the evi command line.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lsp_types::Position;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::error::LintError;
use super::position::encode_cursor;
use crate::document::Document;

const SNAPSHOT_SUFFIX: &str = ".evilint_tmp";

/// Analysis mode requested from evi via `--lint-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LintKind {
    GetDeclaration,
    GetDiagnostics,
    GetFunctions,
    GetVariables,
}

impl LintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LintKind::GetDeclaration => "get-declaration",
            LintKind::GetDiagnostics => "get-diagnostics",
            LintKind::GetFunctions => "get-functions",
            LintKind::GetVariables => "get-variables",
        }
    }

    /// Whether the cursor position means anything for this kind.
    pub fn uses_cursor(self) -> bool {
        !matches!(self, LintKind::GetDiagnostics)
    }
}

impl fmt::Display for LintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the encoder needs besides the document itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    /// Resolved evi executable; `None` when none could be found.
    pub executable: Option<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub tab_width: u32,
    /// Upper bound on a single evi run.
    pub timeout: Duration,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            executable: None,
            include_dirs: Vec::new(),
            tab_width: 4,
            timeout: Duration::from_secs(10),
        }
    }
}

/// One lint request. Immutable once built; produces exactly one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintRequest {
    pub document: PathBuf,
    pub kind: LintKind,
    pub cursor: Option<Position>,
    pub include_dirs: Vec<PathBuf>,
    pub tab_width: u32,
}

impl LintRequest {
    pub fn new(
        document: &Document,
        kind: LintKind,
        cursor: Option<Position>,
        settings: &ToolSettings,
    ) -> Self {
        let mut include_dirs: Vec<PathBuf> = Vec::new();
        let own_dir = document
            .path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .map(Path::to_path_buf);
        for dir in own_dir.into_iter().chain(settings.include_dirs.iter().cloned()) {
            if !include_dirs.contains(&dir) {
                include_dirs.push(dir);
            }
        }

        Self {
            document: document.path.clone(),
            kind,
            cursor: if kind.uses_cursor() { cursor } else { None },
            include_dirs,
            tab_width: settings.tab_width,
        }
    }

    /// Build the evi invocation against `snapshot`.
    pub fn command(&self, program: &Path, snapshot: &Path) -> ToolCommand {
        let mut args = vec![snapshot.display().to_string()];
        args.extend(
            self.include_dirs
                .iter()
                .map(|dir| format!("--include={}", dir.display())),
        );
        args.push(format!("--lint-type={}", self.kind));
        args.push(format!("--lint-pos={}", encode_cursor(self.cursor)));
        args.push(format!("--lint-tab-width={}", self.tab_width));

        ToolCommand {
            program: program.to_path_buf(),
            args,
        }
    }
}

/// A fully encoded evi process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Temporary copy of a document's unsaved text, so evi sees live edits.
///
/// Names are unique per snapshot, so two documents sharing a base name
/// never collide.
pub struct Snapshot {
    file: NamedTempFile,
}

impl Snapshot {
    pub fn write(document: &Document) -> Result<Self, LintError> {
        Self::write_in(document, &std::env::temp_dir())
    }

    pub fn write_in(document: &Document, dir: &Path) -> Result<Self, LintError> {
        let base = document
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".into());

        let mut file = tempfile::Builder::new()
            .prefix(&format!("{base}."))
            .suffix(SNAPSHOT_SUFFIX)
            .tempfile_in(dir)?;
        file.write_all(document.text.as_bytes())?;
        file.flush()?;

        debug!(
            document = %document.path.display(),
            snapshot = %file.path().display(),
            "wrote snapshot"
        );
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the snapshot. Failure is logged, never surfaced.
    pub fn remove(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!(snapshot = %path.display(), "failed to remove snapshot: {e}");
        }
    }
}
