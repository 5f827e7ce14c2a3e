//! Translation between editor coordinates and evi's source locations.
//!
//! evi reports 1-based lines; columns and lengths are passed through as-is.
//! Everything handed to callers is 0-based.

use std::path::PathBuf;

use lsp_types::{Position, Range};

/// A location in a source file, in editor (0-based) coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub length: u32,
}

impl SourcePosition {
    /// Build from evi's 1-based line numbering.
    pub fn from_tool(file: impl Into<PathBuf>, line: u32, column: u32, length: u32) -> Self {
        Self {
            file: file.into(),
            line: line.saturating_sub(1),
            column,
            length,
        }
    }

    pub fn start(&self) -> Position {
        Position::new(self.line, self.column)
    }

    pub fn range(&self) -> Range {
        Range::new(
            self.start(),
            Position::new(self.line, self.column.saturating_add(self.length)),
        )
    }

    /// Like [`range`](Self::range), but a zero-length span is widened to the
    /// end of its line in `text`.
    pub fn range_in(&self, text: &str) -> Range {
        if self.length > 0 {
            return self.range();
        }
        let line_len = text
            .lines()
            .nth(self.line as usize)
            .map(|l| l.chars().count() as u32)
            .unwrap_or(0);
        let end = line_len.max(self.column);
        Range::new(self.start(), Position::new(self.line, end))
    }
}

/// Encode a cursor as evi's `--lint-pos` value: `<line+1>:<column>`,
/// or `0:0` when there is no meaningful cursor.
pub fn encode_cursor(cursor: Option<Position>) -> String {
    match cursor {
        Some(pos) => format!("{}:{}", pos.line.saturating_add(1), pos.character),
        None => "0:0".to_string(),
    }
}
