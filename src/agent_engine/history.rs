//! Action history ledger.
//!
//! `action_history.json` is the source of truth and is replaced atomically on
//! every mutation. `action_history.txt` is an append-only transcript of the
//! same events for humans. Older files written by earlier versions of the
//! agent are accepted and normalised on load; they are never rewritten just
//! to migrate.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::agent_engine::state::{ActionOutcome, CommandResult, SessionStatus};
use crate::errors::{AgentKvmError, AgentKvmResult};

/// Actions rendered into the prompt by default.
pub const DEFAULT_CONTEXT_ACTIONS: usize = 10;

const SUMMARY_EXCERPT: usize = 50;
const CONTEXT_COMMAND_CHARS: usize = 60;
const CONTEXT_RESULT_CHARS: usize = 100;
const CONTEXT_REASONING_CHARS: usize = 150;
const CONTEXT_MAX_LISTED_COMMANDS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub goal: String,
    pub started_at: NaiveDateTime,
    pub status: SessionStatus,
    #[serde(default)]
    pub iterations: u32,
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDateTime>,
}

impl Session {
    fn new(goal: &str) -> Self {
        Self {
            goal: goal.to_string(),
            started_at: now(),
            status: SessionStatus::InProgress,
            iterations: 0,
            actions: Vec::new(),
            completed_at: None,
        }
    }
}

/// One loop iteration. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAction")]
pub struct ActionRecord {
    pub iteration: u32,
    pub timestamp: NaiveDateTime,
    pub observation: String,
    pub reasoning: String,
    pub commands: Vec<String>,
    /// At most `commands.len()` entries; execution stops at the first failure.
    pub results: Vec<CommandResult>,
    pub all_succeeded: bool,
    pub outcome: ActionOutcome,
    pub commands_count: usize,
    pub executed_count: usize,
    pub result_summary: String,
}

impl ActionRecord {
    fn new(
        iteration: u32,
        observation: &str,
        reasoning: &str,
        commands: &[String],
        results: Vec<CommandResult>,
        outcome: ActionOutcome,
    ) -> Self {
        let result_summary = match &outcome {
            ActionOutcome::Executed => summarize_results(&results),
            ActionOutcome::Rejected { reason } => format!("REJECTED: {reason}"),
            ActionOutcome::GoalAchieved => "Goal completed".to_string(),
        };
        let all_succeeded = match outcome {
            ActionOutcome::Executed => !results.is_empty() && results.iter().all(|r| r.succeeded),
            ActionOutcome::Rejected { .. } => false,
            ActionOutcome::GoalAchieved => true,
        };
        Self {
            iteration,
            timestamp: now(),
            observation: observation.to_string(),
            reasoning: reasoning.to_string(),
            commands: commands.to_vec(),
            commands_count: commands.len(),
            executed_count: results.len(),
            results,
            all_succeeded,
            outcome,
            result_summary,
        }
    }
}

/// Every action shape ever written to the ledger file.
///
/// - current: `results[]` plus the derived counters and `outcome`
/// - multi-command without per-command results: `commands[]`,
///   `commands_count`, `executed_count`, `result_summary`
/// - single-command: `command`, `result`
#[derive(Deserialize)]
struct RawAction {
    iteration: u32,
    #[serde(default)]
    timestamp: NaiveDateTime,
    #[serde(default)]
    observation: String,
    #[serde(default)]
    reasoning: String,
    commands: Option<Vec<String>>,
    results: Option<Vec<CommandResult>>,
    all_succeeded: Option<bool>,
    outcome: Option<ActionOutcome>,
    commands_count: Option<usize>,
    executed_count: Option<usize>,
    result_summary: Option<String>,
    command: Option<String>,
    result: Option<String>,
}

impl From<RawAction> for ActionRecord {
    fn from(raw: RawAction) -> Self {
        let commands = raw
            .commands
            .unwrap_or_else(|| raw.command.into_iter().collect());
        let results = raw.results.unwrap_or_default();
        let commands_count = raw.commands_count.unwrap_or(commands.len());
        let executed_count = raw.executed_count.unwrap_or(if results.is_empty() {
            commands_count
        } else {
            results.len()
        });
        let all_succeeded = raw
            .all_succeeded
            .unwrap_or_else(|| !results.is_empty() && results.iter().all(|r| r.succeeded));
        let result_summary = raw
            .result_summary
            .or(raw.result)
            .unwrap_or_else(|| summarize_results(&results));

        Self {
            iteration: raw.iteration,
            timestamp: raw.timestamp,
            observation: raw.observation,
            reasoning: raw.reasoning,
            commands,
            results,
            all_succeeded,
            outcome: raw.outcome.unwrap_or_default(),
            commands_count,
            executed_count,
            result_summary,
        }
    }
}

/// `[OK] <excerpt> | [FAIL] <excerpt>`, or `No execution`.
pub fn summarize_results(results: &[CommandResult]) -> String {
    if results.is_empty() {
        return "No execution".to_string();
    }
    results
        .iter()
        .map(|r| {
            let status = if r.succeeded { "OK" } else { "FAIL" };
            format!("[{status}] {}", truncate(&r.output, SUMMARY_EXCERPT))
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub struct ActionLedger {
    session: Session,
    json_path: PathBuf,
    txt_path: PathBuf,
}

impl ActionLedger {
    /// Starts a fresh session when `reset` is set or no ledger exists;
    /// otherwise resumes the stored one, adopting `goal` if it changed.
    pub fn open(
        json_path: impl Into<PathBuf>,
        txt_path: impl Into<PathBuf>,
        goal: &str,
        reset: bool,
    ) -> AgentKvmResult<Self> {
        let json_path = json_path.into();
        let txt_path = txt_path.into();

        if reset || !json_path.exists() {
            let ledger = Self {
                session: Session::new(goal),
                json_path,
                txt_path,
            };
            ledger.save()?;
            ledger.start_transcript()?;
            tracing::info!(path = %ledger.json_path.display(), "started new action history");
            return Ok(ledger);
        }

        let session = load_session(&json_path)?;
        let mut ledger = Self {
            session,
            json_path,
            txt_path,
        };
        tracing::info!(
            path = %ledger.json_path.display(),
            actions = ledger.session.actions.len(),
            "resuming action history"
        );

        if ledger.session.goal != goal {
            tracing::info!(old = %ledger.session.goal, new = %goal, "goal changed; keeping history");
            ledger.session.goal = goal.to_string();
            ledger.save()?;
            ledger.append_transcript(&format!(
                "\n## Goal updated ({})\nGoal: {goal}\n",
                transcript_clock()
            ))?;
        }

        Ok(ledger)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Records an iteration whose commands went to the executor.
    pub fn append(
        &mut self,
        iteration: u32,
        observation: &str,
        reasoning: &str,
        commands: &[String],
        results: Vec<CommandResult>,
    ) -> AgentKvmResult<()> {
        let record = ActionRecord::new(
            iteration,
            observation,
            reasoning,
            commands,
            results,
            ActionOutcome::Executed,
        );
        self.push(record)
    }

    /// Records a batch the validator vetoed; nothing was executed.
    pub fn append_rejected(
        &mut self,
        iteration: u32,
        observation: &str,
        reasoning: &str,
        commands: &[String],
        message: &str,
    ) -> AgentKvmResult<()> {
        let outcome = ActionOutcome::Rejected {
            reason: message.to_string(),
        };
        let record = ActionRecord::new(iteration, observation, reasoning, commands, Vec::new(), outcome);
        self.push(record)
    }

    /// Records the iteration in which the model reported the goal as reached.
    pub fn append_goal_achieved(
        &mut self,
        iteration: u32,
        observation: &str,
        reasoning: &str,
        commands: &[String],
    ) -> AgentKvmResult<()> {
        let record = ActionRecord::new(
            iteration,
            observation,
            reasoning,
            commands,
            Vec::new(),
            ActionOutcome::GoalAchieved,
        );
        self.push(record)
    }

    pub fn mark_completed(&mut self) -> AgentKvmResult<()> {
        self.session.status = SessionStatus::Completed;
        self.session.completed_at = Some(now());
        self.save()?;
        self.append_transcript(&format!("\n## Goal Achieved at {}\n", transcript_clock()))
    }

    fn push(&mut self, record: ActionRecord) -> AgentKvmResult<()> {
        self.session.iterations = record.iteration;
        let entry = transcript_entry(&record);
        self.session.actions.push(record);
        self.save()?;
        self.append_transcript(&entry)
    }

    /// Text block describing the goal and the last `max_actions` actions,
    /// injected into the next prompt.
    pub fn context(&self, max_actions: usize) -> String {
        let s = &self.session;
        let mut lines = vec![
            format!("Goal: {}", s.goal),
            format!("Status: {}", s.status),
            format!("Total iterations so far: {}", s.iterations),
            String::new(),
        ];

        let start = s.actions.len().saturating_sub(max_actions);
        let recent = &s.actions[start..];
        if recent.is_empty() {
            lines.push("No actions taken yet.".to_string());
            return lines.join("\n");
        }

        lines.push(format!("Recent actions (last {}):", recent.len()));
        for a in recent {
            match a.commands.as_slice() {
                [] => lines.push(format!("  [{}] N/A", a.iteration)),
                [only] if a.commands_count == 1 => lines.push(format!("  [{}] {only}", a.iteration)),
                cmds => {
                    lines.push(format!(
                        "  [{}] {} commands ({} executed):",
                        a.iteration, a.commands_count, a.executed_count
                    ));
                    for cmd in cmds.iter().take(CONTEXT_MAX_LISTED_COMMANDS) {
                        lines.push(format!("      - {}...", truncate(cmd, CONTEXT_COMMAND_CHARS)));
                    }
                }
            }
            if !a.result_summary.is_empty() {
                lines.push(format!(
                    "      Result: {}...",
                    truncate(&a.result_summary, CONTEXT_RESULT_CHARS)
                ));
            }
            if !a.reasoning.is_empty() {
                lines.push(format!(
                    "      Reasoning: {}...",
                    truncate(&a.reasoning, CONTEXT_REASONING_CHARS)
                ));
            }
        }

        lines.join("\n")
    }

    /// Temp file + fsync + rename, so a crash leaves the old or new state.
    fn save(&self) -> AgentKvmResult<()> {
        let json = serde_json::to_string_pretty(&self.session)?;
        let tmp = self.json_path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp).map_err(|e| ledger_error(&tmp, e))?;
            file.write_all(json.as_bytes()).map_err(|e| ledger_error(&tmp, e))?;
            file.sync_all().map_err(|e| ledger_error(&tmp, e))?;
        }
        std::fs::rename(&tmp, &self.json_path).map_err(|e| ledger_error(&self.json_path, e))?;
        sync_parent_dir(&self.json_path);
        tracing::debug!(path = %self.json_path.display(), "action history saved");
        Ok(())
    }

    fn start_transcript(&self) -> AgentKvmResult<()> {
        let header = format!(
            "# Action History\nGoal: {}\nStarted: {}\nStatus: In Progress\n\n## Actions\n",
            self.session.goal,
            transcript_clock()
        );
        std::fs::write(&self.txt_path, header).map_err(|e| ledger_error(&self.txt_path, e))
    }

    fn append_transcript(&self, text: &str) -> AgentKvmResult<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.txt_path)
            .map_err(|e| ledger_error(&self.txt_path, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| ledger_error(&self.txt_path, e))
    }
}

fn load_session(path: &Path) -> AgentKvmResult<Session> {
    let raw = std::fs::read_to_string(path).map_err(|e| ledger_error(path, e))?;
    serde_json::from_str(&raw).map_err(|e| ledger_error(path, e))
}

fn ledger_error(path: &Path, e: impl std::fmt::Display) -> AgentKvmError {
    AgentKvmError::Ledger(format!("{}: {e}", path.display()))
}

/// Makes the rename itself durable. Best effort: not every filesystem allows it.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return;
    };
    if let Err(e) = std::fs::File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(error = %e, dir = %dir.display(), "could not sync ledger directory");
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

fn transcript_clock() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn transcript_entry(a: &ActionRecord) -> String {
    let mut out = format!(
        "\n### Iteration {} ({})\n**Observation:** {}\n**Reasoning:** {}\n**Commands ({}):**\n",
        a.iteration,
        a.timestamp.format("%H:%M:%S"),
        a.observation,
        a.reasoning,
        a.commands.len()
    );
    for (i, cmd) in a.commands.iter().enumerate() {
        let status = match a.results.get(i) {
            Some(r) if r.succeeded => "OK",
            Some(_) => "FAIL",
            None => "NOT EXECUTED",
        };
        out.push_str(&format!("  {}. `{cmd}` [{status}]\n", i + 1));
    }
    out.push_str(&format!("**Result:** {}\n", a.result_summary));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(dir: &tempfile::TempDir) -> (PathBuf, PathBuf) {
        (
            dir.path().join("action_history.json"),
            dir.path().join("action_history.txt"),
        )
    }

    fn cmds(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn reload_after_appends_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let (json, txt) = paths(&dir);

        let mut ledger = ActionLedger::open(&json, &txt, "open firefox", false).unwrap();
        for i in 1..=3 {
            let results = vec![CommandResult::new("xdotool key super", true, "OK")];
            ledger
                .append(i, "desktop", "press super", &cmds(&["xdotool key super"]), results)
                .unwrap();
        }

        let reopened = ActionLedger::open(&json, &txt, "open firefox", false).unwrap();
        assert_eq!(reopened.session().iterations, 3);
        assert_eq!(reopened.session().actions, ledger.session().actions);
        assert!(!dir.path().join("action_history.json.tmp").exists());
    }

    #[test]
    fn save_replaces_a_stale_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let (json, txt) = paths(&dir);
        let tmp = dir.path().join("action_history.json.tmp");
        std::fs::write(&tmp, "{\"goal\": \"half writ").unwrap();

        let mut ledger = ActionLedger::open(&json, &txt, "open firefox", false).unwrap();
        let results = vec![CommandResult::new("xdotool key super", true, "OK")];
        ledger
            .append(1, "desktop", "press super", &cmds(&["xdotool key super"]), results)
            .unwrap();

        assert!(!tmp.exists());
        let on_disk: Session = serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(&on_disk, ledger.session());
    }

    #[test]
    fn partial_execution_is_visible() {
        let dir = tempfile::tempdir().unwrap();
        let (json, txt) = paths(&dir);
        let mut ledger = ActionLedger::open(&json, &txt, "g", false).unwrap();

        let batch = cmds(&["xdotool key a", "xdotool key b", "xdotool key c"]);
        let results = vec![
            CommandResult::new("xdotool key a", true, "OK"),
            CommandResult::new("xdotool key b", false, "FAILED: bad key"),
        ];
        ledger.append(1, "obs", "why", &batch, results).unwrap();

        let a = &ledger.session().actions[0];
        assert!(a.results.len() < a.commands.len());
        assert!(!a.all_succeeded);
        assert_eq!(a.commands_count, 3);
        assert_eq!(a.executed_count, 2);
        assert_eq!(a.result_summary, "[OK] OK | [FAIL] FAILED: bad key");

        let transcript = std::fs::read_to_string(&txt).unwrap();
        assert!(transcript.starts_with("# Action History\nGoal: g\n"));
        assert!(transcript.contains("  2. `xdotool key b` [FAIL]"));
        assert!(transcript.contains("  3. `xdotool key c` [NOT EXECUTED]"));
    }

    #[test]
    fn synthetic_records() {
        let dir = tempfile::tempdir().unwrap();
        let (json, txt) = paths(&dir);
        let mut ledger = ActionLedger::open(&json, &txt, "g", false).unwrap();

        ledger
            .append_rejected(1, "o", "r", &cmds(&["sudo reboot"]), "Command 1: bad")
            .unwrap();
        ledger
            .append_goal_achieved(2, "GOAL ACHIEVED", "done", &cmds(&["xdotool key Escape"]))
            .unwrap();
        ledger.mark_completed().unwrap();

        let s = ledger.session();
        let rejected = &s.actions[0];
        assert_eq!(rejected.executed_count, 0);
        assert!(rejected.results.is_empty());
        assert!(!rejected.all_succeeded);
        assert_eq!(rejected.result_summary, "REJECTED: Command 1: bad");
        assert!(matches!(rejected.outcome, ActionOutcome::Rejected { .. }));

        let done = &s.actions[1];
        assert_eq!(done.outcome, ActionOutcome::GoalAchieved);
        assert!(done.all_succeeded);
        assert_eq!(done.result_summary, "Goal completed");

        assert_eq!(s.status, SessionStatus::Completed);
        assert!(s.completed_at.is_some());
        assert!(std::fs::read_to_string(&txt)
            .unwrap()
            .contains("## Goal Achieved at"));
    }

    #[test]
    fn reset_and_goal_change() {
        let dir = tempfile::tempdir().unwrap();
        let (json, txt) = paths(&dir);
        let mut ledger = ActionLedger::open(&json, &txt, "first", false).unwrap();
        ledger.append(1, "o", "r", &cmds(&["xdotool key a"]), vec![]).unwrap();

        let changed = ActionLedger::open(&json, &txt, "second", false).unwrap();
        assert_eq!(changed.session().goal, "second");
        assert_eq!(changed.session().actions.len(), 1);
        let stored = load_session(&json).unwrap();
        assert_eq!(stored.goal, "second");

        let fresh = ActionLedger::open(&json, &txt, "third", true).unwrap();
        assert!(fresh.session().actions.is_empty());
        assert_eq!(fresh.session().iterations, 0);
    }

    #[test]
    fn context_for_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let (json, txt) = paths(&dir);
        let ledger = ActionLedger::open(&json, &txt, "open the calculator", false).unwrap();
        assert_eq!(
            ledger.context(DEFAULT_CONTEXT_ACTIONS),
            "Goal: open the calculator\nStatus: in_progress\nTotal iterations so far: 0\n\nNo actions taken yet."
        );
    }

    #[test]
    fn context_window_and_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let (json, txt) = paths(&dir);
        let mut ledger = ActionLedger::open(&json, &txt, "g", false).unwrap();

        for i in 1..=12 {
            let results = vec![CommandResult::new("xdotool key a", true, "OK")];
            ledger
                .append(i, "o", "", &cmds(&["xdotool key a"]), results)
                .unwrap();
        }
        let long_cmd = format!("xdotool type \"{}\"", "y".repeat(100));
        let batch = cmds(&[&long_cmd, "xdotool key Return", "xdotool key Tab", "xdotool key Tab"]);
        ledger
            .append(13, "o", &"r".repeat(300), &batch, vec![CommandResult::new(&long_cmd, true, "OK")])
            .unwrap();

        let ctx = ledger.context(10);
        assert!(ctx.contains("Total iterations so far: 13"));
        assert!(ctx.contains("Recent actions (last 10):"));
        assert!(!ctx.contains("  [3] "));
        assert!(ctx.contains("  [4] xdotool key a"));
        assert!(ctx.contains("  [13] 4 commands (1 executed):"));
        assert!(ctx.contains(&format!("      - {}...", &long_cmd[..60])));
        assert!(!ctx.contains("      - xdotool key Tab...\n      - xdotool key Tab"));
        assert!(ctx.contains(&format!("      Reasoning: {}...", "r".repeat(150))));
        assert!(ctx.contains("      Result: [OK] OK..."));
    }

    #[test]
    fn older_ledger_shapes_load_and_render() {
        let dir = tempfile::tempdir().unwrap();
        let (json, txt) = paths(&dir);
        let legacy = r#"{
          "goal": "open settings",
          "started_at": "2024-05-01T10:00:00.123456",
          "status": "in_progress",
          "iterations": 2,
          "actions": [
            {
              "iteration": 1,
              "timestamp": "2024-05-01T10:00:05",
              "observation": "desktop",
              "reasoning": "open menu",
              "command": "xdotool key super",
              "result": "OK"
            },
            {
              "iteration": 2,
              "timestamp": "2024-05-01T10:00:09.5",
              "observation": "menu",
              "reasoning": "type",
              "commands": ["xdotool type settings", "xdotool key Return"],
              "commands_count": 2,
              "executed_count": 1,
              "all_succeeded": false,
              "result_summary": "[FAIL] FAILED: no window"
            }
          ]
        }"#;
        std::fs::write(&json, legacy).unwrap();

        let ledger = ActionLedger::open(&json, &txt, "open settings", false).unwrap();
        let actions = &ledger.session().actions;
        assert_eq!(actions[0].commands, vec!["xdotool key super"]);
        assert_eq!(actions[0].result_summary, "OK");
        assert_eq!(actions[0].outcome, ActionOutcome::Executed);
        assert_eq!(actions[1].executed_count, 1);
        assert!(actions[1].results.is_empty());

        let ctx = ledger.context(10);
        assert!(ctx.contains("  [1] xdotool key super"));
        assert!(ctx.contains("      Result: OK..."));
        assert!(ctx.contains("  [2] 2 commands (1 executed):"));
        assert!(ctx.contains("      Result: [FAIL] FAILED: no window..."));

        // Loading never rewrites the file.
        assert!(std::fs::read_to_string(&json).unwrap().contains("\"command\": \"xdotool key super\""));
    }

    #[test]
    fn corrupt_ledger_is_a_ledger_error() {
        let dir = tempfile::tempdir().unwrap();
        let (json, txt) = paths(&dir);
        std::fs::write(&json, "{not json").unwrap();
        let err = ActionLedger::open(&json, &txt, "g", false).err().unwrap();
        assert!(matches!(err, AgentKvmError::Ledger(_)));
    }
}
