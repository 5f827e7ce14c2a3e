//! Bridge configuration: where evi lives and how features behave.
//!
//! User-level config: `~/.evi/bridge.yaml`
//! Project-level config: `<workspace>/.evi/bridge.yaml` (safe to commit)
//!
//! Project values override user values field by field. The executable
//! resolves from config → `EVI_EXECUTABLE` → a `PATH` search for `evi`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::lint::{ToolSettings, DEFAULT_GATE_WAIT};
use crate::validation::{ValidationSettings, DEFAULT_DEBOUNCE};

pub const EXECUTABLE_ENV: &str = "EVI_EXECUTABLE";
pub const WORKSPACE_PLACEHOLDER: &str = "${workspaceFolder}";
const CONFIG_FILE: &str = "bridge.yaml";

/// One configuration layer as written on disk. Absent fields fall through
/// to the layer below, then to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_dirs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_timeout_ms: Option<u64>,
}

/// Configuration with defaults applied and paths made absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub executable: Option<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub tab_width: u32,
    pub suggestions: bool,
    pub validation: bool,
    pub debug: bool,
    pub debounce: Duration,
    pub gate_wait: Duration,
    pub tool_timeout: Duration,
}

impl ResolvedConfig {
    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            executable: self.executable.clone(),
            include_dirs: self.include_dirs.clone(),
            tab_width: self.tab_width,
            timeout: self.tool_timeout,
        }
    }

    pub fn validation_settings(&self) -> ValidationSettings {
        ValidationSettings {
            enabled: self.validation,
            debounce: self.debounce,
        }
    }
}

/// Path to `~/.evi/`.
fn dirs_path() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|p| PathBuf::from(p).join(".evi"))
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME")
            .ok()
            .map(|p| PathBuf::from(p).join(".evi"))
    }
}

fn read_layer(path: &Path) -> BridgeConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str(&content) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), "ignoring invalid config: {e}");
                BridgeConfig::default()
            }
        },
        Err(_) => BridgeConfig::default(),
    }
}

impl BridgeConfig {
    /// Load and merge the user and project files.
    pub fn load(workspace: Option<&Path>) -> Self {
        let user = dirs_path().map(|d| d.join(CONFIG_FILE));
        let project = workspace.map(|w| w.join(".evi").join(CONFIG_FILE));
        Self::load_from(user.as_deref(), project.as_deref())
    }

    pub fn load_from(user: Option<&Path>, project: Option<&Path>) -> Self {
        let mut config = user.map(read_layer).unwrap_or_default();
        if let Some(project) = project {
            config.merge(read_layer(project));
        }
        config
    }

    /// Overlay `other` on top of `self`, field by field.
    pub fn merge(&mut self, other: BridgeConfig) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            executable,
            include_dirs,
            tab_width,
            suggestions,
            validation,
            debug,
            debounce_ms,
            gate_timeout_ms,
            tool_timeout_ms
        );
    }

    /// Apply defaults against the process environment.
    pub fn resolve(&self, workspace: Option<&Path>) -> ResolvedConfig {
        self.resolve_with(
            workspace,
            std::env::var_os(EXECUTABLE_ENV).map(PathBuf::from),
            std::env::var_os("PATH").as_deref(),
        )
    }

    fn resolve_with(
        &self,
        workspace: Option<&Path>,
        env_executable: Option<PathBuf>,
        path_var: Option<&OsStr>,
    ) -> ResolvedConfig {
        let executable = match &self.executable {
            Some(exe) if exe.is_absolute() => Some(exe.clone()),
            // Relative to the workspace; meaningless without one.
            Some(exe) => workspace.map(|w| w.join(exe)),
            None => env_executable
                .filter(|p| !p.as_os_str().is_empty())
                .or_else(|| path_var.and_then(|p| find_in(executable_name(), p))),
        };

        let include_dirs = self
            .include_dirs
            .iter()
            .flatten()
            .filter_map(|dir| expand_dir(dir, workspace))
            .collect();

        ResolvedConfig {
            executable,
            include_dirs,
            tab_width: self.tab_width.filter(|w| *w > 0).unwrap_or(4),
            suggestions: self.suggestions.unwrap_or(true),
            validation: self.validation.unwrap_or(true),
            debug: self.debug.unwrap_or(false),
            debounce: self
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_DEBOUNCE),
            gate_wait: self
                .gate_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_GATE_WAIT),
            tool_timeout: self
                .tool_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_secs(10)),
        }
    }
}

fn expand_dir(dir: &str, workspace: Option<&Path>) -> Option<PathBuf> {
    let expanded = if dir.contains(WORKSPACE_PLACEHOLDER) {
        let Some(ws) = workspace else {
            warn!(dir, "include dir needs a workspace, skipped");
            return None;
        };
        PathBuf::from(dir.replace(WORKSPACE_PLACEHOLDER, &ws.to_string_lossy()))
    } else {
        PathBuf::from(dir)
    };
    match workspace {
        Some(ws) if expanded.is_relative() => Some(ws.join(expanded)),
        _ => Some(expanded),
    }
}

fn executable_name() -> &'static str {
    if cfg!(windows) {
        "evi.exe"
    } else {
        "evi"
    }
}

/// Search `PATH` for an executable file called `name`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    find_in(name, &std::env::var_os("PATH")?)
}

fn find_in(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
