//! evi-bridge: editor features for the Evi language.
//!
//! Completion, hover, go-to-definition, signature help and diagnostics are
//! answered by running the `evi` compiler in lint mode against a snapshot of
//! the editor's text and decoding the JSON it prints.

pub mod config;
pub mod document;
pub mod lint;
pub mod lsp;
pub mod validation;
