use serde::Serialize;

use crate::errors::AgentKvmResult;
use crate::platform::{command_exists, DisplayServer, InputTool, Platform};

const MACOS_PREFIXES: &[&str] = &["cliclick", "osascript"];
const XDOTOOL_PREFIXES: &[&str] = &["xdotool", "wmctrl"];
const YDOTOOL_PREFIXES: &[&str] = &["ydotool", "wmctrl"];

/// Platform × display server × input tool, resolved once at startup.
///
/// Everything that used to be a string-keyed lookup (allowed command
/// prefixes, the escape command, the prompt vocabulary) is derived from
/// this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformProfile {
    pub platform: Platform,
    /// Only meaningful on Linux.
    pub display_server: Option<DisplayServer>,
    pub input_tool: InputTool,
}

impl PlatformProfile {
    pub fn macos() -> Self {
        Self {
            platform: Platform::MacOs,
            display_server: None,
            input_tool: InputTool::Cliclick,
        }
    }

    /// Falls back to xdotool vocabulary when no input tool was found; the
    /// dependency check refuses to start the loop in that case anyway.
    pub fn linux(display_server: DisplayServer, input_tool: Option<InputTool>) -> Self {
        Self {
            platform: Platform::Linux,
            display_server: Some(display_server),
            input_tool: input_tool.unwrap_or(InputTool::Xdotool),
        }
    }

    pub fn detect() -> AgentKvmResult<Self> {
        let profile = match Platform::detect()? {
            Platform::MacOs => Self::macos(),
            Platform::Linux => {
                let display = DisplayServer::detect();
                let tool = InputTool::detect_linux(command_exists);
                if tool.is_none() {
                    tracing::warn!("no input tool found on PATH");
                }
                Self::linux(display, tool)
            }
        };
        tracing::info!(
            platform = %profile.platform,
            display_server = ?profile.display_server,
            input_tool = %profile.input_tool,
            "platform profile resolved"
        );
        Ok(profile)
    }

    /// Command prefixes the validator admits for this profile.
    pub fn allowed_prefixes(&self) -> &'static [&'static str] {
        match (self.platform, self.input_tool) {
            (Platform::MacOs, _) => MACOS_PREFIXES,
            (Platform::Linux, InputTool::Ydotool) => YDOTOOL_PREFIXES,
            (Platform::Linux, _) => XDOTOOL_PREFIXES,
        }
    }

    /// Only the absolute-coordinate pointer tool needs `mousemove && click`.
    pub fn allows_move_then_click(&self) -> bool {
        self.platform == Platform::Linux && self.input_tool == InputTool::Ydotool
    }

    /// Harmless command the model is told to emit alongside `GOAL ACHIEVED`.
    pub fn escape_command(&self) -> &'static str {
        match self.input_tool {
            InputTool::Cliclick => "cliclick kp:escape",
            InputTool::Xdotool => "xdotool key Escape",
            InputTool::Ydotool => "ydotool key esc",
        }
    }

    /// The allow-list as the prompt spells it, e.g. `'xdotool', 'wmctrl'`.
    pub fn allowed_tools_display(&self) -> String {
        self.allowed_prefixes()
            .iter()
            .map(|p| format!("'{p}'"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
