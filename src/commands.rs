//! Command-line surface: argument parsing, dependency check and the
//! startup sequence that wires the loop together.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser};

use crate::agent_engine::artifacts::Workspace;
use crate::agent_engine::history::ActionLedger;
use crate::agent_engine::state::{AbortReason, LoopState};
use crate::agent_engine::{AgentEngine, LoopSettings};
use crate::config::{AppConfig, WorkspaceConfig};
use crate::errors::{AgentKvmError, AgentKvmResult};
use crate::executor::{Executor, ShellRunner};
use crate::llm::registry::{connect_backend, BackendSettings};
use crate::llm::types::BackendKind;
use crate::perception::CommandScreenSource;
use crate::platform::deps::{backend_dependency, check_dependencies, DependencyReport};
use crate::platform::{command_exists, PlatformProfile};

const AFTER_HELP: &str = "\
Examples:
  agentkvm -b ollama --model llava \"Open Firefox and search for weather\"
  agentkvm -b ollama --host 192.168.1.100 --port 11434 \"Open browser\"
  agentkvm -b claude \"Open Safari and search for weather\"
  agentkvm -b codex \"Click the Settings icon\"
  agentkvm --check-deps

Platforms:
  macOS     cliclick, osascript, screencapture
  Linux     ydotool/xdotool, wmctrl, grim/scrot";

/// Screenshot-driven desktop automation agent (macOS, Linux)
#[derive(Parser, Debug)]
#[command(name = "agentkvm")]
#[command(version, about, long_about = None, after_help = AFTER_HELP)]
pub struct Cli {
    /// The goal for the agent to achieve
    pub goal: Option<String>,

    /// Model backend (default: ollama, or config.toml)
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Ollama host (default: localhost)
    #[arg(long, env = "OLLAMA_HOST")]
    pub host: Option<String>,

    /// Ollama port (default: 11434)
    #[arg(long, env = "OLLAMA_PORT")]
    pub port: Option<u16>,

    /// Ollama model to use (prompts for one if not given)
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum iterations (default: 50)
    #[arg(short = 'm', long = "max-iter")]
    pub max_iter: Option<u32>,

    /// Start a fresh action history instead of resuming
    #[arg(short, long)]
    pub reset: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Check dependencies and exit
    #[arg(long)]
    pub check_deps: bool,

    /// Directory for screenshots, responses, logs and the action history
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Path to config.toml
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl From<AbortReason> for AgentKvmError {
    fn from(reason: AbortReason) -> Self {
        match reason {
            AbortReason::Capture(e) => AgentKvmError::Capture(e),
            AbortReason::Backend(e) => AgentKvmError::Backend(e),
            AbortReason::InvalidCommand(e) => AgentKvmError::ValidationRejected(e),
            AbortReason::Ledger(e) => AgentKvmError::Ledger(e),
        }
    }
}

/// Everything after argument parsing and logging setup.
pub async fn execute(cli: Cli, config: AppConfig) -> AgentKvmResult<ExitCode> {
    let profile = PlatformProfile::detect()?;

    let settings = BackendSettings::resolve(
        &config.backend,
        cli.backend,
        cli.host.clone(),
        cli.port,
        cli.model.clone(),
    );

    let backend_dep = backend_dependency(settings.kind, &config.backend.cli);
    let report = check_dependencies(
        profile.platform,
        profile.display_server,
        backend_dep.as_ref(),
        command_exists,
    );
    print_optional_dependencies(&report, cli.verbose || config.logging.verbose);
    if !report.is_satisfied() {
        return Err(AgentKvmError::MissingDependencies(report.render_required()));
    }

    if cli.check_deps {
        println!("All required dependencies are installed.");
        return Ok(ExitCode::SUCCESS);
    }

    let Some(goal) = cli.goal.as_deref() else {
        Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "the following arguments are required: <GOAL>",
            )
            .exit();
    };

    let workspace = Workspace::new(
        WorkspaceConfig {
            dir: cli.workspace.clone().or(config.workspace.dir.clone()),
        }
        .resolve_dir(),
    );
    workspace.ensure_dirs()?;
    tracing::info!(workspace = %workspace.root().display(), "workspace ready");

    let backend = connect_backend(&settings).await?;
    let ledger = ActionLedger::open(workspace.history_json(), workspace.history_txt(), goal, cli.reset)?;

    let agent = &config.agent;
    let runner = ShellRunner::new(Duration::from_secs(agent.command_timeout_secs));
    let executor = Executor::new(
        Box::new(runner),
        workspace.log_dir(),
        Duration::from_millis(agent.command_delay_ms),
    );
    let loop_settings = LoopSettings {
        max_iterations: cli.max_iter.unwrap_or(agent.max_iterations),
        context_actions: agent.history_context_actions,
        settle_delay: Duration::from_millis(agent.settle_delay_ms),
    };

    let mut engine = AgentEngine::new(
        profile,
        backend,
        Box::new(CommandScreenSource::new(profile)),
        executor,
        ledger,
        workspace,
        loop_settings,
    );

    match engine.run().await {
        LoopState::Aborted { reason, .. } => Err(reason.into()),
        _ => Ok(ExitCode::SUCCESS),
    }
}

/// Optional tools are only listed in verbose mode; missing required tools
/// are reported through the returned error.
fn print_optional_dependencies(report: &DependencyReport, verbose: bool) {
    if verbose && !report.missing_optional.is_empty() {
        let rule = "-".repeat(60);
        println!("{rule}\nNote: Some optional tools are missing:\n");
        print!("{}", report.render_optional());
        println!("{rule}\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_short_flags() {
        let cli = Cli::try_parse_from([
            "agentkvm",
            "-b",
            "claude",
            "-m",
            "5",
            "-r",
            "-v",
            "Open the settings app",
        ])
        .unwrap();
        assert_eq!(cli.backend, Some(BackendKind::Claude));
        assert_eq!(cli.max_iter, Some(5));
        assert!(cli.reset && cli.verbose);
        assert_eq!(cli.goal.as_deref(), Some("Open the settings app"));
    }

    #[test]
    fn goal_is_optional_for_dependency_check() {
        let cli = Cli::try_parse_from(["agentkvm", "--check-deps"]).unwrap();
        assert!(cli.check_deps);
        assert!(cli.goal.is_none());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["agentkvm", "-b", "gpt", "goal"]).is_err());
    }

    #[test]
    fn abort_reasons_map_to_errors() {
        let err: AgentKvmError = AbortReason::InvalidCommand("Command 1: Empty command".into()).into();
        assert!(matches!(err, AgentKvmError::ValidationRejected(_)));
        let err: AgentKvmError = AbortReason::Ledger("disk full".into()).into();
        assert_eq!(err.to_string(), "Ledger error: disk full");
    }

    #[test]
    fn aborted_run_reports_a_single_prefix() {
        let cause = AgentKvmError::BackendUnavailable("Ollama request failed: connection refused".into());
        let err: AgentKvmError = AbortReason::Backend(cause.detail()).into();
        assert_eq!(err.to_string(), "Backend error: Ollama request failed: connection refused");

        let cause = AgentKvmError::Capture("grim exited with 1".into());
        let err: AgentKvmError = AbortReason::Capture(cause.detail()).into();
        assert_eq!(err.to_string(), "Screen capture error: grim exited with 1");
    }
}
