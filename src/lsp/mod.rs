//! Language features for Evi, answered by the evi compiler.
//!
//! Uses `lsp-types` for the standard data structures (Diagnostic,
//! CompletionItem, Hover, ...) but carries no transport. Every answer comes
//! from one [`LintBridge`] query; a failed query is logged by the bridge and
//! rendered as "no answer" here.

pub mod completion;
pub mod convert;
pub mod hover;
pub mod signature;
pub mod uri;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lsp_types::{
    CompletionItem, Diagnostic, Hover, HoverContents, LanguageString, Location, MarkedString,
    ParameterInformation, ParameterLabel, Position, SignatureHelp, SignatureInformation,
};

use crate::document::Document;
use crate::lint::{LintBridge, LintError, LintKind};

pub use uri::{path_to_uri, uri_to_path};

pub const SYMBOL_NOT_FOUND: &str = "Symbol not found.";

/// Diagnostics for one file, as reported while checking a document.
pub type FileDiagnostics = (PathBuf, Vec<Diagnostic>);

/// Language service over open documents.
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// Diagnostics grouped by file. Errors are returned so the caller can
    /// tell configuration problems apart from "no diagnostics".
    async fn diagnostics(&self, doc: &Document) -> Result<Vec<FileDiagnostics>, LintError>;

    async fn completions(&self, doc: &Document, pos: Position) -> Vec<CompletionItem>;

    async fn hover(&self, doc: &Document, pos: Position) -> Option<Hover>;

    async fn definition(&self, doc: &Document, pos: Position) -> Option<Location>;

    async fn signature_help(&self, doc: &Document, pos: Position) -> Option<SignatureHelp>;
}

pub struct EviService {
    bridge: Arc<LintBridge>,
    suggestions: AtomicBool,
}

impl EviService {
    pub fn new(bridge: Arc<LintBridge>) -> Self {
        Self {
            bridge,
            suggestions: AtomicBool::new(true),
        }
    }

    pub fn bridge(&self) -> &Arc<LintBridge> {
        &self.bridge
    }

    /// Toggle completion and signature help.
    pub fn set_suggestions(&self, enabled: bool) {
        self.suggestions.store(enabled, Ordering::Relaxed);
    }

    pub fn suggestions(&self) -> bool {
        self.suggestions.load(Ordering::Relaxed)
    }
}

fn evi_code(value: String) -> MarkedString {
    MarkedString::LanguageString(LanguageString {
        language: "evi".into(),
        value,
    })
}

#[async_trait]
impl LanguageService for EviService {
    async fn diagnostics(&self, doc: &Document) -> Result<Vec<FileDiagnostics>, LintError> {
        let diags = self
            .bridge
            .run(doc, LintKind::GetDiagnostics, None)
            .await?
            .into_diagnostics();
        Ok(convert::group_by_file(&diags, doc))
    }

    async fn completions(&self, doc: &Document, pos: Position) -> Vec<CompletionItem> {
        if !self.suggestions() {
            return Vec::new();
        }
        // Only the part of the word left of the cursor filters proposals.
        let prefix: String = match doc.word_range_at(pos) {
            Some(range) => doc
                .line(pos.line)
                .unwrap_or_default()
                .chars()
                .skip(range.start.character as usize)
                .take(pos.character.saturating_sub(range.start.character) as usize)
                .collect(),
            None => String::new(),
        };

        let mut proposals = completion::Proposals::new(&prefix);
        if completion::wants_variables(&prefix) {
            if let Some(result) = self.bridge.query(doc, LintKind::GetVariables, Some(pos)).await {
                proposals.add_variables(&result.into_variables());
            }
        }
        if completion::wants_functions(&prefix) {
            if let Some(result) = self.bridge.query(doc, LintKind::GetFunctions, Some(pos)).await {
                proposals.add_functions(&result.into_functions());
            }
        }
        proposals.finish()
    }

    async fn hover(&self, doc: &Document, pos: Position) -> Option<Hover> {
        let range = doc.word_range_at(pos)?;
        let word = doc.word_at(pos)?;

        if let Some(ty) = hover::literal_type(&word) {
            return Some(Hover {
                contents: HoverContents::Scalar(evi_code(format!("{word} -> {ty}"))),
                range: Some(range),
            });
        }

        let signature = if let Some(name) = hover::variable_name(&word) {
            self.bridge
                .query(doc, LintKind::GetVariables, Some(pos))
                .await
                .and_then(|r| {
                    r.into_variables()
                        .into_iter()
                        .find(|v| v.identifier == name)
                })
                .map(|v| v.signature())
        } else {
            self.bridge
                .query(doc, LintKind::GetFunctions, Some(pos))
                .await
                .and_then(|r| {
                    r.into_functions()
                        .into_iter()
                        .find(|f| f.identifier == word)
                })
                .map(|f| f.signature())
        };

        let contents = match signature {
            Some(sig) => HoverContents::Scalar(evi_code(sig)),
            None => HoverContents::Array(vec![
                evi_code(word),
                MarkedString::String(SYMBOL_NOT_FOUND.into()),
            ]),
        };
        Some(Hover {
            contents,
            range: Some(range),
        })
    }

    async fn definition(&self, doc: &Document, pos: Position) -> Option<Location> {
        let declaration = self
            .bridge
            .query(doc, LintKind::GetDeclaration, Some(pos))
            .await?
            .into_declaration()?;
        convert::location(&declaration)
    }

    async fn signature_help(&self, doc: &Document, pos: Position) -> Option<SignatureHelp> {
        if !self.suggestions() {
            return None;
        }
        let site = signature::call_site(&doc.text, pos)?;
        let func = self
            .bridge
            .query(doc, LintKind::GetFunctions, Some(pos))
            .await?
            .into_functions()
            .into_iter()
            .find(|f| f.identifier == site.callee)?;

        let active = site
            .argument
            .min((func.parameters.len() as u32).saturating_sub(1));
        let parameters = func
            .parameters
            .iter()
            .map(|p| ParameterInformation {
                label: ParameterLabel::Simple(p.clone()),
                documentation: None,
            })
            .collect();

        Some(SignatureHelp {
            signatures: vec![SignatureInformation {
                label: func.signature(),
                documentation: None,
                parameters: Some(parameters),
                active_parameter: None,
            }],
            active_signature: Some(0),
            active_parameter: Some(active),
        })
    }
}
