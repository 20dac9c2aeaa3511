use std::sync::LazyLock;

use regex::Regex;

/// Upper bound on commands taken from one response; extra lines are dropped.
pub const MAX_COMMANDS: usize = 5;

static OBS_BLOCK: LazyLock<Regex> = LazyLock::new(|| block_regex("OBS"));
static THINK_BLOCK: LazyLock<Regex> = LazyLock::new(|| block_regex("THINK"));
static CMD_BLOCK: LazyLock<Regex> = LazyLock::new(|| block_regex("CMD"));

/// A section starts at `###NAME` + newline and runs to the next `###` or the end.
fn block_regex(marker: &str) -> Regex {
    Regex::new(&format!(r"(?s)###{marker}\s*\n(.*?)(?:###|\z)"))
        .expect("static block pattern is valid")
}

/// The three blocks a model response is asked to contain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub observation: String,
    pub reasoning: String,
    pub commands: Vec<String>,
}

impl ParsedResponse {
    /// True when the observation opens with `GOAL ACHIEVED` (any case).
    pub fn signals_goal_achieved(&self) -> bool {
        const MARKER: &str = "GOAL ACHIEVED";
        let obs = self.observation.trim_start();
        obs.get(..MARKER.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(MARKER))
    }
}

fn capture_block(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Splits raw model output into observation, reasoning and commands.
///
/// Missing markers give empty fields rather than an error; an empty command
/// list is rejected later by the validator. Command lines are trimmed but
/// otherwise kept verbatim.
pub fn extract_blocks(text: &str) -> ParsedResponse {
    let observation = capture_block(&OBS_BLOCK, text).unwrap_or_default();
    let reasoning = capture_block(&THINK_BLOCK, text).unwrap_or_default();
    let commands = capture_block(&CMD_BLOCK, text)
        .map(|block| {
            block
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .take(MAX_COMMANDS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ParsedResponse {
        observation,
        reasoning,
        commands,
    }
}
