//! In-memory view of an open editor document.
//!
//! Columns are counted in `char`s.

use std::path::PathBuf;

use lsp_types::{Position, Range};

/// Language id the bridge answers for.
pub const EVI_LANGUAGE_ID: &str = "evi";

/// An open document: its on-disk path plus the editor's current (possibly
/// unsaved) text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub language_id: String,
    pub text: String,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language_id: EVI_LANGUAGE_ID.to_string(),
            text: text.into(),
        }
    }

    pub fn with_language(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = language_id.into();
        self
    }

    pub fn is_evi(&self) -> bool {
        self.language_id == EVI_LANGUAGE_ID
    }

    /// Text of line `line` without its terminator.
    pub fn line(&self, line: u32) -> Option<&str> {
        self.text.lines().nth(line as usize)
    }

    /// The word under `pos`, if any.
    pub fn word_at(&self, pos: Position) -> Option<String> {
        let range = self.word_range_at(pos)?;
        let line: Vec<char> = self.line(pos.line)?.chars().collect();
        Some(
            line[range.start.character as usize..range.end.character as usize]
                .iter()
                .collect(),
        )
    }

    /// Range of the word under `pos`.
    ///
    /// A word is a run of identifier characters (plus `$`, `#` and `.`), an
    /// optional leading `-` before a number, or a whole double-quoted string
    /// literal when the cursor is inside one.
    pub fn word_range_at(&self, pos: Position) -> Option<Range> {
        let line: Vec<char> = self.line(pos.line)?.chars().collect();
        let col = pos.character as usize;
        if col > line.len() {
            return None;
        }

        if let Some((start, end)) = string_literal_around(&line, col) {
            return Some(span(pos.line, start, end));
        }

        let mut start = col;
        while start > 0 && is_word_char(line[start - 1]) {
            start -= 1;
        }
        let mut end = col;
        while end < line.len() && is_word_char(line[end]) {
            end += 1;
        }
        if start == end {
            return None;
        }
        if start > 0 && line[start - 1] == '-' && line[start].is_ascii_digit() {
            start -= 1;
        }
        Some(span(pos.line, start, end))
    }
}

fn span(line: u32, start: usize, end: usize) -> Range {
    Range::new(
        Position::new(line, start as u32),
        Position::new(line, end as u32),
    )
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '#' | '.')
}

/// Bounds (inclusive of quotes) of the string literal containing `col`.
fn string_literal_around(line: &[char], col: usize) -> Option<(usize, usize)> {
    let mut open: Option<usize> = None;
    let mut i = 0;
    while i < line.len() {
        match (line[i], open) {
            ('\\', Some(_)) => i += 1,
            ('"', None) => open = Some(i),
            ('"', Some(start)) => {
                if (start..=i).contains(&col) {
                    return Some((start, i + 1));
                }
                open = None;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("/src/main.evi", text)
    }

    #[test]
    fn word_at_identifier() {
        let d = doc("@main i32 ()\n  %count i32 12;\n");
        assert_eq!(d.word_at(Position::new(0, 3)), Some("main".into()));
        assert_eq!(d.word_at(Position::new(1, 4)), Some("count".into()));
        // Cursor right after a word still picks it up.
        assert_eq!(d.word_at(Position::new(0, 5)), Some("main".into()));
    }

    #[test]
    fn word_at_keeps_sigils() {
        let d = doc("=$count 1;\n#apply \"std\"");
        assert_eq!(d.word_at(Position::new(0, 3)), Some("$count".into()));
        assert_eq!(d.word_at(Position::new(1, 2)), Some("#apply".into()));
    }

    #[test]
    fn word_at_numbers_and_strings() {
        let d = doc("~ -42; %s chr* \"a \\\"b\\\" c\";");
        assert_eq!(d.word_at(Position::new(0, 4)), Some("-42".into()));
        assert_eq!(d.word_at(Position::new(0, 18)), Some("\"a \\\"b\\\" c\"".into()));
    }

    #[test]
    fn word_at_whitespace_is_none() {
        let d = doc("a   b");
        assert_eq!(d.word_at(Position::new(0, 2)), None);
        assert_eq!(d.word_at(Position::new(3, 0)), None);
        assert_eq!(d.word_at(Position::new(0, 99)), None);
    }

    #[test]
    fn language_filter() {
        assert!(doc("").is_evi());
        assert!(!doc("").with_language("rust").is_evi());
    }
}
