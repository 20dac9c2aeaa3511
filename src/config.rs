use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{AgentKvmError, AgentKvmResult};
use crate::llm::types::BackendKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub cli: CliConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Overridden by `--host` / `OLLAMA_HOST`.
    pub host: Option<String>,
    /// Overridden by `--port` / `OLLAMA_PORT`.
    pub port: Option<u16>,
    /// When absent the user picks one interactively at startup.
    pub model: Option<String>,
    #[serde(default = "default_generate_timeout")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            model: None,
            timeout_secs: default_generate_timeout(),
        }
    }
}

fn default_generate_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_codex_program")]
    pub codex_program: String,
    #[serde(default = "default_claude_program")]
    pub claude_program: String,
    #[serde(default = "default_cli_timeout")]
    pub timeout_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            codex_program: default_codex_program(),
            claude_program: default_claude_program(),
            timeout_secs: default_cli_timeout(),
        }
    }
}

fn default_codex_program() -> String {
    "codex".into()
}

fn default_claude_program() -> String {
    "claude".into()
}

fn default_cli_timeout() -> u64 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Number of recent actions rendered into each prompt.
    #[serde(default = "default_context_actions")]
    pub history_context_actions: usize,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Pause between two commands of the same batch.
    #[serde(default = "default_command_delay")]
    pub command_delay_ms: u64,
    /// Pause after a batch so the UI can catch up before the next screenshot.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            history_context_actions: default_context_actions(),
            command_timeout_secs: default_command_timeout(),
            command_delay_ms: default_command_delay(),
            settle_delay_ms: default_settle_delay(),
        }
    }
}

fn default_max_iterations() -> u32 {
    50
}

fn default_context_actions() -> usize {
    10
}

fn default_command_timeout() -> u64 {
    30
}

fn default_command_delay() -> u64 {
    300
}

fn default_settle_delay() -> u64 {
    1000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory holding the ledger, screenshots and command logs.
    pub dir: Option<PathBuf>,
}

impl WorkspaceConfig {
    /// Returns the configured directory, else `~/.local/share/agentkvm`
    /// (platform equivalent), falling back to the current working directory.
    pub fn resolve_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        if let Some(data_dir) = dirs::data_local_dir() {
            return data_dir.join("agentkvm");
        }
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }
}

/// Logging verbosity, threaded into subscriber setup instead of living in a global.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub verbose: bool,
}

impl LogConfig {
    pub fn default_directive(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

fn resolve_config_path() -> AgentKvmResult<Option<PathBuf>> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    Ok(None)
}

/// Loads `config.toml`. An explicit path must exist; otherwise the file is
/// looked up next to the executable and in the working directory, and
/// defaults are used when neither has one.
pub fn load_config(explicit: Option<&Path>) -> AgentKvmResult<AppConfig> {
    let path = match explicit {
        Some(p) if p.exists() => p.to_path_buf(),
        Some(p) => {
            return Err(AgentKvmError::Config(format!(
                "config file not found: {}",
                p.display()
            )))
        }
        None => match resolve_config_path()? {
            Some(p) => p,
            None => {
                tracing::debug!("no config.toml found, using defaults");
                return Ok(AppConfig::default());
            }
        },
    };
    parse_config_file(&path)
}

fn parse_config_file(path: &Path) -> AgentKvmResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::debug!(path = %path.display(), backend = ?config.backend.kind, "config loaded");
    Ok(config)
}
