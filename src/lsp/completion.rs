//! Completion proposals built from evi's symbol tables.

use std::collections::HashSet;
use std::sync::OnceLock;

use lsp_types::{CompletionItem, CompletionItemKind};
use regex::Regex;

use crate::lint::{FunctionSignature, Variable};

fn identifier_regex() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("static regex"))
}

/// Variables are offered for an empty prefix or one starting with `$`.
pub fn wants_variables(prefix: &str) -> bool {
    prefix.is_empty() || prefix.starts_with('$')
}

/// Functions are offered for an empty prefix or a plain identifier.
pub fn wants_functions(prefix: &str) -> bool {
    prefix.is_empty() || identifier_regex().is_match(prefix)
}

/// Accumulates proposals matching one prefix, without duplicate labels.
pub struct Proposals<'a> {
    prefix: &'a str,
    seen: HashSet<String>,
    items: Vec<CompletionItem>,
}

impl<'a> Proposals<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self {
            prefix,
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, label: String, kind: CompletionItemKind, detail: String) {
        if !label.starts_with(self.prefix) || !self.seen.insert(label.clone()) {
            return;
        }
        self.items.push(CompletionItem {
            label,
            kind: Some(kind),
            detail: Some(detail),
            ..Default::default()
        });
    }

    pub fn add_variables(&mut self, vars: &[Variable]) {
        for var in vars {
            self.push(
                format!("${}", var.identifier),
                CompletionItemKind::VARIABLE,
                var.signature(),
            );
        }
    }

    pub fn add_functions(&mut self, funcs: &[FunctionSignature]) {
        for func in funcs {
            self.push(
                func.identifier.clone(),
                CompletionItemKind::FUNCTION,
                func.signature(),
            );
        }
    }

    pub fn finish(self) -> Vec<CompletionItem> {
        self.items
    }
}
