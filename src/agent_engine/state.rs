use serde::{Deserialize, Serialize};

/// Outcome of one executed command as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: String,
    pub succeeded: bool,
    /// Truncated combined output; the full text lives in the command log.
    pub output: String,
}

impl CommandResult {
    pub fn new(command: impl Into<String>, succeeded: bool, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            succeeded,
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => f.write_str("in_progress"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

/// How an iteration ended, as recorded on its action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Commands were handed to the executor (some may have failed).
    #[default]
    Executed,
    /// The validator vetoed the batch; nothing ran.
    Rejected { reason: String },
    /// The model reported the goal as reached; nothing ran.
    GoalAchieved,
}

/// Why a run stopped early with a non-zero exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    Capture(String),
    Backend(String),
    InvalidCommand(String),
    Ledger(String),
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capture(e) => write!(f, "screenshot failed: {e}"),
            Self::Backend(e) => write!(f, "model backend failed: {e}"),
            Self::InvalidCommand(e) => write!(f, "invalid command: {e}"),
            Self::Ledger(e) => write!(f, "could not record history: {e}"),
        }
    }
}

/// States of the action loop. `Running` is the only non-terminal state and
/// the iteration number only ever increases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    Running { iteration: u32 },
    GoalAchieved { iteration: u32 },
    MaxIterationsReached { iterations: u32 },
    Aborted { iteration: u32, reason: AbortReason },
}

impl LoopState {
    pub fn initial() -> Self {
        Self::Running { iteration: 1 }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running { .. })
    }

    /// 0 for goal reached and the soft max-iterations stop, 1 for aborts.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Aborted { .. } => 1,
            _ => 0,
        }
    }
}
