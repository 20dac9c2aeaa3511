// Per-platform prompt rendering. Templates live in `prompts/` and are
// embedded at compile time.
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::perception::Resolution;
use crate::platform::{InputTool, Platform, PlatformProfile};

const MACOS_TEMPLATE: &str = include_str!("../../prompts/macos.md");
const LINUX_TEMPLATE: &str = include_str!("../../prompts/linux.md");
const XDOTOOL_COMMANDS: &str = include_str!("../../prompts/linux_xdotool.md");
const XDOTOOL_EXAMPLES: &str = include_str!("../../prompts/linux_xdotool_examples.md");
const YDOTOOL_COMMANDS: &str = include_str!("../../prompts/linux_ydotool.md");
const YDOTOOL_EXAMPLES: &str = include_str!("../../prompts/linux_ydotool_examples.md");

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([a-z_]+)\}\}").expect("placeholder regex is valid"));

/// Renders the instruction prompt for one iteration.
pub fn build_prompt(
    profile: &PlatformProfile,
    goal: &str,
    history_context: &str,
    resolution: Resolution,
) -> String {
    let template = match profile.platform {
        Platform::MacOs => MACOS_TEMPLATE,
        Platform::Linux => LINUX_TEMPLATE,
    };
    let (commands, examples) = match profile.input_tool {
        InputTool::Ydotool => (YDOTOOL_COMMANDS, YDOTOOL_EXAMPLES),
        InputTool::Xdotool | InputTool::Cliclick => (XDOTOOL_COMMANDS, XDOTOOL_EXAMPLES),
    };

    let width = resolution.width.to_string();
    let height = resolution.height.to_string();
    let allowed_tools = profile.allowed_tools_display();

    // One pass over the template: inserted text is never rescanned.
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let value: &str = match &caps[1] {
                "goal" => goal,
                "history" => history_context,
                "width" => &width,
                "height" => &height,
                "input_tool" => profile.input_tool.program(),
                "input_commands" => commands.trim_end(),
                "examples" => examples.trim_end(),
                "allowed_tools" => &allowed_tools,
                "escape_command" => profile.escape_command(),
                _ => return caps[0].to_string(),
            };
            value.to_string()
        })
        .trim_end()
        .to_string()
}
