use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{AgentKvmError, AgentKvmResult};
use crate::llm::provider::ModelBackend;

const CODEX_SUFFIX: &str =
    "\n\nAnalyze the attached screenshot and respond with ###OBS, ###THINK, and ###CMD blocks.";

const CLAUDE_SUFFIX: &str = "\n\nAnalyze the attached screenshot and respond with ###OBS, ###THINK, and ###CMD blocks.\n\
IMPORTANT: Output ONLY the three blocks (###OBS, ###THINK, ###CMD) with no other text.";

/// Argument convention of the wrapped CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliFlavor {
    /// `codex -p <prompt> --image <path>`
    Codex,
    /// `claude -p <prompt> --allowedTools "" <path>`
    Claude,
}

/// Model backend that shells out to a coding-assistant CLI and reads its stdout.
pub struct CliBackend {
    flavor: CliFlavor,
    program: String,
    timeout: Duration,
}

impl CliBackend {
    pub fn codex(program: impl Into<String>) -> Self {
        Self::new(CliFlavor::Codex, program)
    }

    pub fn claude(program: impl Into<String>) -> Self {
        Self::new(CliFlavor::Claude, program)
    }

    fn new(flavor: CliFlavor, program: impl Into<String>) -> Self {
        Self {
            flavor,
            program: program.into(),
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn flavor(&self) -> CliFlavor {
        self.flavor
    }

    pub fn build_args(&self, prompt: &str, screenshot: &Path) -> Vec<OsString> {
        match self.flavor {
            CliFlavor::Codex => vec![
                "-p".into(),
                format!("{prompt}{CODEX_SUFFIX}").into(),
                "--image".into(),
                screenshot.as_os_str().to_owned(),
            ],
            CliFlavor::Claude => vec![
                "-p".into(),
                format!("{prompt}{CLAUDE_SUFFIX}").into(),
                "--allowedTools".into(),
                "".into(),
                screenshot.as_os_str().to_owned(),
            ],
        }
    }
}

#[async_trait]
impl ModelBackend for CliBackend {
    fn name(&self) -> &str {
        match self.flavor {
            CliFlavor::Codex => "codex",
            CliFlavor::Claude => "claude",
        }
    }

    async fn call(&self, prompt: &str, screenshot: &Path) -> AgentKvmResult<String> {
        tracing::debug!(program = %self.program, "calling CLI backend");

        let child = tokio::process::Command::new(&self.program)
            .args(self.build_args(prompt, screenshot))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AgentKvmError::BackendUnavailable(format!("cannot run `{}`: {e}", self.program))
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(AgentKvmError::Backend(format!(
                    "{} timed out after {}s",
                    self.program,
                    self.timeout.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentKvmError::Backend(format!(
                "{} failed ({}): {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codex_arguments() {
        let backend = CliBackend::codex("codex");
        let args = backend.build_args("GOAL", Path::new("/tmp/screen.png"));
        assert_eq!(args.len(), 4);
        assert_eq!(args[0], "-p");
        assert!(args[1].to_string_lossy().starts_with("GOAL\n\nAnalyze the attached screenshot"));
        assert_eq!(args[2], "--image");
        assert_eq!(args[3], "/tmp/screen.png");
        assert_eq!(backend.name(), "codex");
    }

    #[test]
    fn claude_arguments() {
        let backend = CliBackend::claude("claude");
        let args = backend.build_args("GOAL", Path::new("/tmp/screen.png"));
        assert_eq!(args.len(), 5);
        assert!(args[1].to_string_lossy().contains("Output ONLY the three blocks"));
        assert_eq!(args[2], "--allowedTools");
        assert_eq!(args[3], "");
        assert_eq!(args[4], "/tmp/screen.png");
        assert_eq!(backend.flavor(), CliFlavor::Claude);
    }

    #[tokio::test]
    async fn missing_executable_is_unavailable() {
        let backend = CliBackend::codex("/nonexistent/agentkvm-test-cli");
        let err = backend.call("p", Path::new("/tmp/x.png")).await.unwrap_err();
        assert!(matches!(err, AgentKvmError::BackendUnavailable(_)));
    }

    #[cfg(unix)]
    fn script(dir: &tempfile::TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join("fake-cli.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_is_returned_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(&dir, r#"printf '###OBS\nscreen\n###CMD\n%s\n' "$4""#);
        let backend = CliBackend::codex(program);
        let text = backend.call("p", Path::new("/tmp/shot.png")).await.unwrap();
        assert_eq!(text, "###OBS\nscreen\n###CMD\n/tmp/shot.png\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(&dir, "echo 'rate limited' >&2\nexit 3");
        let backend = CliBackend::claude(program);
        let err = backend.call("p", Path::new("/tmp/shot.png")).await.unwrap_err();
        match err {
            AgentKvmError::Backend(msg) => assert!(msg.contains("rate limited")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_cli_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(&dir, "sleep 5");
        let backend = CliBackend::codex(program).with_timeout(Duration::from_millis(200));
        let err = backend.call("p", Path::new("/tmp/shot.png")).await.unwrap_err();
        assert!(matches!(err, AgentKvmError::Backend(ref m) if m.contains("timed out")));
    }
}
