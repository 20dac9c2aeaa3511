// OS-level command invocation for validated automation commands.
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;

/// What happened when one command was handed to the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Process exited; `output` is stdout followed by stderr.
    Completed { success: bool, output: String },
    TimedOut { after: Duration },
    /// Process could not be started or awaited.
    Failed(String),
}

/// Runs a single command string. Implementations never panic or return
/// errors; every failure mode is folded into [`RunOutcome`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> RunOutcome;
}

/// Runs each command through `sh -c` with a hard timeout.
pub struct ShellRunner {
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> RunOutcome {
        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => return RunOutcome::Failed(e.to_string()),
        };

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(out)) => {
                let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
                output.push_str(&String::from_utf8_lossy(&out.stderr));
                RunOutcome::Completed {
                    success: out.status.success(),
                    output,
                }
            }
            Ok(Err(e)) => RunOutcome::Failed(e.to_string()),
            Err(_) => RunOutcome::TimedOut { after: self.timeout },
        }
    }
}
