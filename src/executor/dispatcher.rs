// Runs a validated command batch in order, stopping at the first failure.
use std::path::PathBuf;
use std::time::Duration;

use crate::agent_engine::artifacts::file_timestamp;
use crate::agent_engine::state::CommandResult;
use crate::executor::input::{CommandRunner, RunOutcome};

/// Characters of command output kept in the ledger.
pub const EXCERPT_CHARS: usize = 200;

pub struct Executor {
    runner: Box<dyn CommandRunner>,
    log_dir: PathBuf,
    delay: Duration,
}

impl Executor {
    pub fn new(runner: Box<dyn CommandRunner>, log_dir: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            runner,
            log_dir: log_dir.into(),
            delay,
        }
    }

    /// Executes `commands` strictly in order with `delay` between them.
    /// Never fails: every problem becomes an unsuccessful [`CommandResult`],
    /// and nothing after the first unsuccessful command is attempted.
    pub async fn execute(&self, commands: &[String]) -> Vec<CommandResult> {
        let total = commands.len();
        let mut results = Vec::with_capacity(total);

        for (i, command) in commands.iter().enumerate() {
            tracing::info!("  [{}/{}] {}", i + 1, total, command);
            let result = self.execute_one(i, command).await;
            let failed = !result.succeeded;
            if failed {
                tracing::warn!(output = %result.output, "command failed, stopping sequence");
            }
            results.push(result);

            if failed {
                break;
            }
            if i + 1 < total {
                tokio::time::sleep(self.delay).await;
            }
        }

        results
    }

    async fn execute_one(&self, index: usize, command: &str) -> CommandResult {
        match self.runner.run(command).await {
            RunOutcome::Completed { success, output } => {
                self.write_log(index, &output);
                let head = excerpt(&output);
                let text = match (success, head.is_empty()) {
                    (true, true) => "OK".to_string(),
                    (true, false) => head,
                    (false, _) => format!("FAILED: {head}"),
                };
                CommandResult::new(command, success, text)
            }
            RunOutcome::TimedOut { after } => {
                CommandResult::new(command, false, format!("TIMEOUT after {}s", after.as_secs()))
            }
            RunOutcome::Failed(e) => CommandResult::new(command, false, format!("ERROR: {e}")),
        }
    }

    /// Full output goes to `logs/cmd_<ts>_<n>.out`; a write failure is only logged.
    fn write_log(&self, index: usize, output: &str) {
        let path = self
            .log_dir
            .join(format!("cmd_{}_{}.out", file_timestamp(), index + 1));
        if let Err(e) = std::fs::write(&path, output) {
            tracing::warn!(path = %path.display(), error = %e, "could not write command log");
        }
    }
}

fn excerpt(output: &str) -> String {
    output.chars().take(EXCERPT_CHARS).collect()
}
