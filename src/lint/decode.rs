//! Response decoding, keyed by the lint kind that was requested.
//!
//! evi writes its JSON by hand and emits every scalar as a string
//! (`"line": "5"`, `"invalid": "true"`), so numbers and flags are accepted in
//! either spelling. Anything that does not match the expected shape is
//! [`LintError::MalformedOutput`], never an empty collection.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::error::LintError;
use super::position::SourcePosition;
use super::request::LintKind;

/// Diagnostic severity as reported by evi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

/// A satellite note attached to a diagnostic ("previous declaration here").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedNote {
    pub position: SourcePosition,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintDiagnostic {
    pub position: SourcePosition,
    pub message: String,
    pub severity: Severity,
    pub related: Vec<RelatedNote>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub identifier: String,
    pub return_type: String,
    pub parameters: Vec<String>,
    pub variadic: bool,
}

impl FunctionSignature {
    /// `@name ret (p1 p2 ...)`
    pub fn signature(&self) -> String {
        let mut parts = self.parameters.clone();
        if self.variadic {
            parts.push("...".into());
        }
        format!(
            "@{} {} ({})",
            self.identifier,
            self.return_type,
            parts.join(" ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub identifier: String,
    pub type_name: String,
}

impl Variable {
    /// `$name -> type`
    pub fn signature(&self) -> String {
        format!("${} -> {}", self.identifier, self.type_name)
    }
}

/// Decoded evi answer, one variant per lint kind. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintResult {
    Declaration(Option<SourcePosition>),
    Diagnostics(Vec<LintDiagnostic>),
    Functions(Vec<FunctionSignature>),
    Variables(Vec<Variable>),
}

impl LintResult {
    pub fn kind(&self) -> LintKind {
        match self {
            LintResult::Declaration(_) => LintKind::GetDeclaration,
            LintResult::Diagnostics(_) => LintKind::GetDiagnostics,
            LintResult::Functions(_) => LintKind::GetFunctions,
            LintResult::Variables(_) => LintKind::GetVariables,
        }
    }

    /// Rewrite every position in file `from` to file `to`.
    pub fn remap_path(&mut self, from: &Path, to: &Path) {
        let fix = |pos: &mut SourcePosition| {
            if pos.file == from {
                pos.file = to.to_path_buf();
            }
        };
        match self {
            LintResult::Declaration(Some(pos)) => fix(pos),
            LintResult::Diagnostics(diags) => {
                for d in diags {
                    fix(&mut d.position);
                    for note in &mut d.related {
                        fix(&mut note.position);
                    }
                }
            }
            LintResult::Declaration(None)
            | LintResult::Functions(_)
            | LintResult::Variables(_) => {}
        }
    }

    pub fn into_declaration(self) -> Option<SourcePosition> {
        match self {
            LintResult::Declaration(d) => d,
            _ => None,
        }
    }

    pub fn into_diagnostics(self) -> Vec<LintDiagnostic> {
        match self {
            LintResult::Diagnostics(d) => d,
            _ => Vec::new(),
        }
    }

    pub fn into_functions(self) -> Vec<FunctionSignature> {
        match self {
            LintResult::Functions(f) => f,
            _ => Vec::new(),
        }
    }

    pub fn into_variables(self) -> Vec<Variable> {
        match self {
            LintResult::Variables(v) => v,
            _ => Vec::new(),
        }
    }
}

/// Decode ANSI-free evi stdout for `kind`.
pub fn decode(kind: LintKind, stdout: &str) -> Result<LintResult, LintError> {
    let value: Value = serde_json::from_str(stdout.trim())
        .map_err(|e| LintError::malformed(kind, format!("invalid JSON: {e}")))?;

    match kind {
        LintKind::GetDeclaration => declaration(&value),
        LintKind::GetDiagnostics => diagnostics(&value),
        LintKind::GetFunctions => functions(&value),
        LintKind::GetVariables => variables(&value),
    }
}

// ── Wire records ──

/// Non-negative integer, as a JSON number or a numeric string.
fn scalar_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u32),
        Text(String),
    }
    match Repr::deserialize(d)? {
        Repr::Number(n) => Ok(n),
        Repr::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("`{s}` is not a non-negative integer"))),
    }
}

/// `true`/`false`, as JSON booleans or strings. `null` is false.
fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Bool(bool),
        Text(String),
    }
    match Option::<Repr>::deserialize(d)? {
        None => Ok(false),
        Some(Repr::Bool(b)) => Ok(b),
        Some(Repr::Text(s)) => match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(D::Error::custom(format!("`{s}` is not a boolean"))),
        },
    }
}

/// Entries evi could not fill in carry `"invalid": "true"` and nothing else
/// worth reading.
#[derive(Deserialize)]
struct Marker {
    #[serde(default, deserialize_with = "flag")]
    invalid: bool,
}

#[derive(Deserialize)]
struct RawPosition {
    file: String,
    #[serde(deserialize_with = "scalar_u32")]
    line: u32,
    #[serde(deserialize_with = "scalar_u32")]
    column: u32,
    #[serde(deserialize_with = "scalar_u32")]
    length: u32,
}

impl From<RawPosition> for SourcePosition {
    fn from(raw: RawPosition) -> Self {
        SourcePosition::from_tool(raw.file, raw.line, raw.column, raw.length)
    }
}

#[derive(Deserialize)]
struct RawNote {
    #[serde(flatten)]
    position: RawPosition,
    message: String,
}

#[derive(Deserialize)]
struct RawDiagnostic {
    #[serde(flatten)]
    position: RawPosition,
    message: String,
    #[serde(rename = "type")]
    severity: Severity,
    #[serde(default)]
    related: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct RawFunction {
    #[serde(rename = "return type", alias = "return_type")]
    return_type: String,
    #[serde(default)]
    parameters: Option<Vec<String>>,
    #[serde(default, deserialize_with = "flag")]
    variadic: bool,
}

// ── Per-kind decoding ──

fn parse<T: DeserializeOwned>(kind: LintKind, value: &Value, what: &str) -> Result<T, LintError> {
    T::deserialize(value).map_err(|e| LintError::malformed(kind, format!("{what}: {e}")))
}

fn is_invalid(kind: LintKind, value: &Value, what: &str) -> Result<bool, LintError> {
    Ok(parse::<Marker>(kind, value, what)?.invalid)
}

fn declaration(value: &Value) -> Result<LintResult, LintError> {
    let kind = LintKind::GetDeclaration;
    let what = "the declaration";
    if is_invalid(kind, value, what)? || value.as_object().is_some_and(|o| o.is_empty()) {
        return Ok(LintResult::Declaration(None));
    }
    let position: RawPosition = parse(kind, value, what)?;
    Ok(LintResult::Declaration(Some(position.into())))
}

fn diagnostics(value: &Value) -> Result<LintResult, LintError> {
    let kind = LintKind::GetDiagnostics;
    let entries: Vec<Value> = parse(kind, value, "the diagnostic list")?;

    let mut out = Vec::with_capacity(entries.len());
    for entry in &entries {
        if is_invalid(kind, entry, "a diagnostic")? {
            continue;
        }
        let raw: RawDiagnostic = parse(kind, entry, "a diagnostic")?;

        let mut related = Vec::new();
        for note in raw.related.iter().flatten() {
            if is_invalid(kind, note, "a related note")? {
                continue;
            }
            let note: RawNote = parse(kind, note, "a related note")?;
            related.push(RelatedNote {
                position: note.position.into(),
                message: note.message,
            });
        }

        out.push(LintDiagnostic {
            position: raw.position.into(),
            message: raw.message,
            severity: raw.severity,
            related,
        });
    }
    Ok(LintResult::Diagnostics(out))
}

fn functions(value: &Value) -> Result<LintResult, LintError> {
    let kind = LintKind::GetFunctions;
    let table: BTreeMap<String, Value> = parse(kind, value, "the function table")?;

    let mut out = Vec::with_capacity(table.len());
    for (identifier, entry) in table {
        if identifier.is_empty() {
            continue;
        }
        let raw: RawFunction = parse(kind, &entry, &format!("function `{identifier}`"))?;
        out.push(FunctionSignature {
            identifier,
            return_type: raw.return_type,
            parameters: raw.parameters.unwrap_or_default(),
            variadic: raw.variadic,
        });
    }
    Ok(LintResult::Functions(out))
}

fn variables(value: &Value) -> Result<LintResult, LintError> {
    let table: BTreeMap<String, String> =
        parse(LintKind::GetVariables, value, "the variable table")?;
    Ok(LintResult::Variables(
        table
            .into_iter()
            .filter(|(identifier, _)| !identifier.is_empty())
            .map(|(identifier, type_name)| Variable {
                identifier,
                type_name,
            })
            .collect(),
    ))
}
