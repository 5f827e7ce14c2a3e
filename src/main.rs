use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lsp_types::{DiagnosticSeverity, Position};
use serde_json::json;
use tracing::{debug, info};

use evi_bridge::config::BridgeConfig;
use evi_bridge::document::Document;
use evi_bridge::lint::{LintBridge, LintKind};
use evi_bridge::lsp::{EviService, LanguageService};

#[derive(Parser)]
#[command(name = "evi-bridge", about = "Editor features for Evi, answered by the evi compiler.")]
struct Cli {
    /// Workspace root (defaults to current directory)
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report diagnostics for files
    Check {
        /// Print JSON instead of `file:line:col: severity: message`
        #[arg(long)]
        json: bool,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Declaration of the symbol at FILE:LINE:COL
    Definition { at: Cursor },
    /// Hover text at FILE:LINE:COL
    Hover { at: Cursor },
    /// Completions at FILE:LINE:COL
    Complete { at: Cursor },
    /// Signature help at FILE:LINE:COL
    Signature { at: Cursor },
    /// Functions and variables visible in FILE
    Symbols { file: PathBuf },
}

/// `FILE:LINE:COL`, 1-based.
#[derive(Clone, Debug)]
struct Cursor {
    file: PathBuf,
    position: Position,
}

impl FromStr for Cursor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, ':');
        let (Some(col), Some(line), Some(file)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("expected FILE:LINE:COL, got `{s}`"));
        };
        let line: u32 = line.parse().map_err(|_| format!("bad line `{line}`"))?;
        let col: u32 = col.parse().map_err(|_| format!("bad column `{col}`"))?;
        if line == 0 || col == 0 || file.is_empty() {
            return Err(format!("expected FILE:LINE:COL (1-based), got `{s}`"));
        }
        Ok(Cursor {
            file: file.into(),
            position: Position::new(line - 1, col - 1),
        })
    }
}

async fn open(path: &Path) -> Result<Document> {
    let path = std::fs::canonicalize(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    Ok(Document::new(path, text))
}

fn severity_name(severity: Option<DiagnosticSeverity>) -> &'static str {
    match severity {
        Some(DiagnosticSeverity::WARNING) => "warning",
        Some(DiagnosticSeverity::INFORMATION) => "info",
        Some(DiagnosticSeverity::HINT) => "hint",
        _ => "error",
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let workspace = match cli.workspace {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let config = BridgeConfig::load(Some(&workspace));
    let level = if cli.verbose || config.debug.unwrap_or(false) {
        "evi_bridge=debug"
    } else {
        "evi_bridge=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .init();

    let resolved = config.resolve(Some(&workspace));
    debug!(?resolved, "configuration");
    match &resolved.executable {
        Some(exe) => info!("using evi at {}", exe.display()),
        None => info!("no evi executable configured or on PATH"),
    }

    let bridge = Arc::new(LintBridge::new(resolved.tool_settings(), resolved.gate_wait));
    let service = EviService::new(bridge.clone());
    service.set_suggestions(resolved.suggestions);

    match cli.command {
        Command::Check { json, files } => {
            let mut failed = false;
            let mut report = Vec::new();
            for file in &files {
                let doc = open(file).await?;
                let groups = service
                    .diagnostics(&doc)
                    .await
                    .with_context(|| format!("checking {}", doc.path.display()))?;
                for (path, diags) in groups {
                    failed |= diags
                        .iter()
                        .any(|d| d.severity == Some(DiagnosticSeverity::ERROR));
                    if json {
                        report.push(json!({ "file": path, "diagnostics": diags }));
                        continue;
                    }
                    for d in &diags {
                        println!(
                            "{}:{}:{}: {}: {}",
                            path.display(),
                            d.range.start.line + 1,
                            d.range.start.character + 1,
                            severity_name(d.severity),
                            d.message
                        );
                    }
                }
            }
            if json {
                print_json(&report)?;
            }
            return Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS });
        }
        Command::Definition { at } => {
            let doc = open(&at.file).await?;
            print_json(&service.definition(&doc, at.position).await)?;
        }
        Command::Hover { at } => {
            let doc = open(&at.file).await?;
            print_json(&service.hover(&doc, at.position).await)?;
        }
        Command::Complete { at } => {
            let doc = open(&at.file).await?;
            print_json(&service.completions(&doc, at.position).await)?;
        }
        Command::Signature { at } => {
            let doc = open(&at.file).await?;
            print_json(&service.signature_help(&doc, at.position).await)?;
        }
        Command::Symbols { file } => {
            let doc = open(&file).await?;
            let functions = bridge
                .run(&doc, LintKind::GetFunctions, None)
                .await?
                .into_functions();
            let variables = bridge
                .run(&doc, LintKind::GetVariables, None)
                .await?
                .into_variables();
            print_json(&json!({
                "functions": functions.iter().map(|f| json!({
                    "name": f.identifier,
                    "return_type": f.return_type,
                    "parameters": f.parameters,
                    "variadic": f.variadic,
                    "signature": f.signature(),
                })).collect::<Vec<_>>(),
                "variables": variables.iter().map(|v| json!({
                    "name": v.identifier,
                    "type": v.type_name,
                    "signature": v.signature(),
                })).collect::<Vec<_>>(),
            }))?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
