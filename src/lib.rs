pub mod agent_engine;
pub mod commands;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;
pub mod platform;

use std::process::ExitCode;

use clap::Parser;

use crate::commands::Cli;
use crate::config::LogConfig;

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
pub fn init_tracing(log: LogConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log.default_directive())),
        )
        .with_target(false)
        .init();
}

pub async fn run() -> ExitCode {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref());
    let verbose = cli.verbose || config.as_ref().is_ok_and(|c| c.logging.verbose);
    init_tracing(LogConfig { verbose });

    let result = match config {
        Ok(config) => commands::execute(cli, config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "agentkvm failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
