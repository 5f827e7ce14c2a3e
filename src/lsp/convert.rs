//! Decoded evi records to lsp-types values.

use std::path::PathBuf;

use lsp_types::{
    Diagnostic, DiagnosticRelatedInformation, DiagnosticSeverity, Location, Range,
};

use super::uri::path_to_uri;
use crate::document::Document;
use crate::lint::{LintDiagnostic, Severity, SourcePosition};

pub const DIAGNOSTIC_SOURCE: &str = "evi";

pub fn severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

pub fn location(position: &SourcePosition) -> Option<Location> {
    Some(Location::new(path_to_uri(&position.file)?, position.range()))
}

/// Range for `position`, widened to end of line when it is zero-length and
/// lies in `document` (the only file whose text is at hand).
fn display_range(position: &SourcePosition, document: &Document) -> Range {
    if position.file == document.path {
        position.range_in(&document.text)
    } else {
        position.range()
    }
}

pub fn diagnostic(diag: &LintDiagnostic, document: &Document) -> Diagnostic {
    let related: Vec<DiagnosticRelatedInformation> = diag
        .related
        .iter()
        .filter_map(|note| {
            Some(DiagnosticRelatedInformation {
                location: location(&note.position)?,
                message: note.message.clone(),
            })
        })
        .collect();

    Diagnostic {
        range: display_range(&diag.position, document),
        severity: Some(severity(diag.severity)),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: diag.message.clone(),
        related_information: (!related.is_empty()).then_some(related),
        ..Default::default()
    }
}

/// Convert and group by reporting file, in first-seen order.
pub fn group_by_file(
    diags: &[LintDiagnostic],
    document: &Document,
) -> Vec<(PathBuf, Vec<Diagnostic>)> {
    let mut groups: Vec<(PathBuf, Vec<Diagnostic>)> = Vec::new();
    for d in diags {
        let converted = diagnostic(d, document);
        match groups.iter_mut().find(|(file, _)| *file == d.position.file) {
            Some((_, list)) => list.push(converted),
            None => groups.push((d.position.file.clone(), vec![converted])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::RelatedNote;
    use lsp_types::Position;

    fn diag(file: &str, line: u32, length: u32, severity: Severity) -> LintDiagnostic {
        LintDiagnostic {
            position: SourcePosition::from_tool(file, line, 0, length),
            message: format!("at {line}"),
            severity,
            related: vec![],
        }
    }

    #[test]
    fn converts_fields() {
        let doc = Document::new("/src/a.evi", "%x i32 1\n");
        let mut d = diag("/src/a.evi", 1, 2, Severity::Warning);
        d.related.push(RelatedNote {
            position: SourcePosition::from_tool("/src/b.evi", 3, 1, 1),
            message: "declared here".into(),
        });

        let out = diagnostic(&d, &doc);
        assert_eq!(out.severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(out.source.as_deref(), Some("evi"));
        assert_eq!(out.range, Range::new(Position::new(0, 0), Position::new(0, 2)));
        let related = out.related_information.unwrap();
        assert_eq!(related[0].message, "declared here");
        assert_eq!(related[0].location.uri.as_str(), "file:///src/b.evi");
        assert_eq!(related[0].location.range.start, Position::new(2, 1));
    }

    #[test]
    fn zero_length_in_own_file_widens() {
        let doc = Document::new("/src/a.evi", "%x i32 1\n");
        let out = diagnostic(&diag("/src/a.evi", 1, 0, Severity::Error), &doc);
        assert_eq!(out.range.end, Position::new(0, 8));

        let out = diagnostic(&diag("/src/other.evi", 1, 0, Severity::Error), &doc);
        assert_eq!(out.range.end, Position::new(0, 0));
    }

    #[test]
    fn grouped_in_first_seen_order() {
        let doc = Document::new("/src/a.evi", "");
        let diags = vec![
            diag("/src/b.evi", 1, 1, Severity::Error),
            diag("/src/a.evi", 2, 1, Severity::Error),
            diag("/src/b.evi", 3, 1, Severity::Hint),
        ];
        let groups = group_by_file(&diags, &doc);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, PathBuf::from("/src/b.evi"));
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[1].severity, Some(DiagnosticSeverity::HINT));
        assert_eq!(groups[1].0, PathBuf::from("/src/a.evi"));
    }
}
