pub mod deps;
pub mod profile;

pub use profile::PlatformProfile;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{AgentKvmError, AgentKvmResult};

/// Host operating systems the agent can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    MacOs,
    Linux,
}

impl Platform {
    pub fn detect() -> AgentKvmResult<Self> {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> AgentKvmResult<Self> {
        match os {
            "macos" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            other => Err(AgentKvmError::UnsupportedPlatform(format!(
                "{other} (supported platforms: macOS, Linux)"
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacOs => f.write_str("macos"),
            Self::Linux => f.write_str("linux"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayServer {
    X11,
    Wayland,
    Unknown,
}

impl DisplayServer {
    pub fn detect() -> Self {
        Self::from_env(
            std::env::var_os("WAYLAND_DISPLAY").is_some(),
            std::env::var_os("DISPLAY").is_some(),
        )
    }

    /// Wayland wins when both sockets are advertised (XWayland sessions).
    pub fn from_env(wayland_display: bool, x_display: bool) -> Self {
        if wayland_display {
            Self::Wayland
        } else if x_display {
            Self::X11
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for DisplayServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X11 => f.write_str("x11"),
            Self::Wayland => f.write_str("wayland"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Pointer/keyboard driver whose command vocabulary the prompt and the
/// validator are parameterised on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputTool {
    Cliclick,
    Xdotool,
    /// Absolute-coordinate pointer tool; needs `mousemove` and `click` as two calls.
    Ydotool,
}

impl InputTool {
    pub fn program(&self) -> &'static str {
        match self {
            Self::Cliclick => "cliclick",
            Self::Xdotool => "xdotool",
            Self::Ydotool => "ydotool",
        }
    }

    /// Prefers ydotool (works under Wayland through its daemon), then xdotool.
    pub fn detect_linux(exists: impl Fn(&str) -> bool) -> Option<Self> {
        [Self::Ydotool, Self::Xdotool]
            .into_iter()
            .find(|tool| exists(tool.program()))
    }
}

impl fmt::Display for InputTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Returns true if `program` resolves on `PATH`.
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_os_is_unsupported() {
        assert_eq!(Platform::from_os("linux").unwrap(), Platform::Linux);
        assert_eq!(Platform::from_os("macos").unwrap(), Platform::MacOs);
        assert!(matches!(
            Platform::from_os("windows"),
            Err(AgentKvmError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn display_server_prefers_wayland() {
        assert_eq!(DisplayServer::from_env(true, true), DisplayServer::Wayland);
        assert_eq!(DisplayServer::from_env(false, true), DisplayServer::X11);
        assert_eq!(DisplayServer::from_env(false, false), DisplayServer::Unknown);
    }

    #[test]
    fn input_tool_detection_order() {
        assert_eq!(InputTool::detect_linux(|_| true), Some(InputTool::Ydotool));
        assert_eq!(
            InputTool::detect_linux(|p| p == "xdotool"),
            Some(InputTool::Xdotool)
        );
        assert_eq!(InputTool::detect_linux(|_| false), None);
    }
}
