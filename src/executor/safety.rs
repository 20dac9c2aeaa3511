//! Admission gate for model-proposed commands.
//!
//! This is a textual allow-list plus deny-list over untrusted model output.
//! It does not parse the automation tools' grammar and is not a sandbox:
//! anything the patterns below do not name gets through. Keep the policy
//! exactly this strict; do not quietly widen or narrow it.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::platform::PlatformProfile;

/// Substrings that veto a command regardless of its prefix: deletion,
/// privilege escalation, network fetches, process killing, appending
/// redirection, statement separators, command substitution and `eval`.
pub const FORBIDDEN_PATTERNS: &[&str] = &[
    "rm ", "sudo", "curl ", "wget ", "kill ", "pkill", ">>", ";", "`", "$(", "eval ",
];

const AND_CHAIN: &str = "&&";
const OR_CHAIN: &str = "||";

/// ydotool cannot move and click in one call, so exactly this shape may use `&&`.
static MOVE_THEN_CLICK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ydotool\s+mousemove\b[^&]*&&\s*ydotool\s+click\b[^&]*$")
        .expect("static move-then-click pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    #[error("No commands provided")]
    NoCommands,

    #[error("Empty command")]
    EmptyCommand,

    #[error("Command must start with one of {allowed:?}. Got: {command}")]
    DisallowedPrefix {
        allowed: &'static [&'static str],
        command: String,
    },

    #[error("Command contains forbidden pattern '{0}'")]
    ForbiddenPattern(&'static str),
}

/// Why a batch was vetoed, and which command (0-based) tripped the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub index: Option<usize>,
    pub reason: RejectionReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "Command {}: {}", i + 1, self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl std::error::Error for Rejection {}

/// Checks one command against the profile's allow-list and the deny-list.
pub fn validate_command(command: &str, profile: &PlatformProfile) -> Result<(), RejectionReason> {
    if command.is_empty() {
        return Err(RejectionReason::EmptyCommand);
    }

    let allowed = profile.allowed_prefixes();
    if !allowed.iter().any(|p| command.starts_with(p)) {
        return Err(RejectionReason::DisallowedPrefix {
            allowed,
            command: command.to_string(),
        });
    }

    if let Some(pattern) = FORBIDDEN_PATTERNS.iter().copied().find(|p| command.contains(p)) {
        return Err(RejectionReason::ForbiddenPattern(pattern));
    }

    if command.contains(AND_CHAIN)
        && !(profile.allows_move_then_click() && MOVE_THEN_CLICK.is_match(command))
    {
        return Err(RejectionReason::ForbiddenPattern(AND_CHAIN));
    }

    if command.contains(OR_CHAIN) {
        return Err(RejectionReason::ForbiddenPattern(OR_CHAIN));
    }

    Ok(())
}

/// All-or-nothing gate: every command is checked before any runs, and the
/// first violation vetoes the whole batch.
pub fn validate_commands(commands: &[String], profile: &PlatformProfile) -> Result<(), Rejection> {
    if commands.is_empty() {
        return Err(Rejection {
            index: None,
            reason: RejectionReason::NoCommands,
        });
    }

    for (i, command) in commands.iter().enumerate() {
        validate_command(command, profile).map_err(|reason| Rejection {
            index: Some(i),
            reason,
        })?;
    }

    Ok(())
}
