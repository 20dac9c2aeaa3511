// Screen capture through the platform's screenshot CLI.
use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;

use crate::errors::{AgentKvmError, AgentKvmResult};
use crate::perception::traits::ScreenSource;
use crate::perception::types::{parse_system_profiler, parse_wlr_randr, parse_xdpyinfo, Resolution};
use crate::platform::{command_exists, DisplayServer, Platform, PlatformProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotTool {
    Screencapture,
    Grim,
    Scrot,
    GnomeScreenshot,
    Import,
}

impl ScreenshotTool {
    pub fn program(&self) -> &'static str {
        match self {
            Self::Screencapture => "screencapture",
            Self::Grim => "grim",
            Self::Scrot => "scrot",
            Self::GnomeScreenshot => "gnome-screenshot",
            Self::Import => "import",
        }
    }

    pub fn args(&self, dest: &Path) -> Vec<OsString> {
        let dest = dest.as_os_str().to_os_string();
        match self {
            Self::Screencapture | Self::Grim | Self::Scrot => vec![dest],
            Self::GnomeScreenshot => vec!["-f".into(), dest],
            Self::Import => vec!["-window".into(), "root".into(), dest],
        }
    }

    /// First installed tool in preference order for the display server.
    pub fn select(
        platform: Platform,
        display_server: Option<DisplayServer>,
        exists: impl Fn(&str) -> bool,
    ) -> Option<Self> {
        let candidates: &[Self] = match (platform, display_server) {
            (Platform::MacOs, _) => return Some(Self::Screencapture),
            (Platform::Linux, Some(DisplayServer::Wayland)) => &[Self::Grim, Self::GnomeScreenshot],
            (Platform::Linux, _) => &[Self::Scrot, Self::GnomeScreenshot, Self::Import],
        };
        candidates.iter().copied().find(|t| exists(t.program()))
    }
}

/// [`ScreenSource`] backed by external programs.
pub struct CommandScreenSource {
    profile: PlatformProfile,
    tool: Option<ScreenshotTool>,
}

impl CommandScreenSource {
    pub fn new(profile: PlatformProfile) -> Self {
        let tool = ScreenshotTool::select(profile.platform, profile.display_server, command_exists);
        match tool {
            Some(t) => tracing::debug!(tool = t.program(), "screenshot tool selected"),
            None => tracing::warn!("no screenshot tool found on PATH"),
        }
        Self { profile, tool }
    }

    async fn query(program: &str, args: &[&str]) -> Option<String> {
        let out = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;
        Some(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

#[async_trait]
impl ScreenSource for CommandScreenSource {
    async fn capture(&self, dest: &Path) -> AgentKvmResult<()> {
        let tool = self.tool.ok_or_else(|| {
            let hint = match self.profile.display_server {
                Some(DisplayServer::Wayland) => "no Wayland screenshot tool available (install grim)",
                _ => "no screenshot tool available (install scrot)",
            };
            AgentKvmError::Capture(hint.into())
        })?;

        let out = tokio::process::Command::new(tool.program())
            .args(tool.args(dest))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AgentKvmError::Capture(format!("failed to run {}: {e}", tool.program())))?;

        if !out.status.success() {
            return Err(AgentKvmError::Capture(format!(
                "{} exited with {}: {}",
                tool.program(),
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        if !dest.exists() {
            return Err(AgentKvmError::Capture(format!(
                "{} did not write {}",
                tool.program(),
                dest.display()
            )));
        }
        Ok(())
    }

    async fn resolution(&self) -> Resolution {
        let detected = match self.profile.platform {
            Platform::MacOs => Self::query("system_profiler", &["SPDisplaysDataType"])
                .await
                .and_then(|t| parse_system_profiler(&t)),
            Platform::Linux => {
                let mut res = None;
                if self.profile.display_server == Some(DisplayServer::Wayland) {
                    res = Self::query("wlr-randr", &[]).await.and_then(|t| parse_wlr_randr(&t));
                }
                if res.is_none() {
                    res = Self::query("xdpyinfo", &[]).await.and_then(|t| parse_xdpyinfo(&t));
                }
                res
            }
        };
        detected.unwrap_or_else(|| {
            tracing::warn!(fallback = %Resolution::FALLBACK, "could not detect screen resolution");
            Resolution::FALLBACK
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_follows_preference_order() {
        assert_eq!(
            ScreenshotTool::select(Platform::MacOs, None, |_| false),
            Some(ScreenshotTool::Screencapture)
        );
        assert_eq!(
            ScreenshotTool::select(Platform::Linux, Some(DisplayServer::Wayland), |p| p != "grim"),
            Some(ScreenshotTool::GnomeScreenshot)
        );
        assert_eq!(
            ScreenshotTool::select(Platform::Linux, Some(DisplayServer::X11), |p| p == "import"),
            Some(ScreenshotTool::Import)
        );
        assert_eq!(
            ScreenshotTool::select(Platform::Linux, Some(DisplayServer::Wayland), |p| p == "scrot"),
            None
        );
    }

    #[test]
    fn argument_shapes() {
        let dest = Path::new("/tmp/currentscreen.png");
        assert_eq!(ScreenshotTool::Grim.args(dest), vec![OsString::from("/tmp/currentscreen.png")]);
        assert_eq!(
            ScreenshotTool::GnomeScreenshot.args(dest),
            vec![OsString::from("-f"), OsString::from("/tmp/currentscreen.png")]
        );
        assert_eq!(
            ScreenshotTool::Import.args(dest),
            vec![
                OsString::from("-window"),
                OsString::from("root"),
                OsString::from("/tmp/currentscreen.png")
            ]
        );
    }

    #[tokio::test]
    async fn missing_tool_is_a_capture_error() {
        let source = CommandScreenSource {
            profile: PlatformProfile::linux(DisplayServer::Wayland, None),
            tool: None,
        };
        let err = source.capture(Path::new("/tmp/x.png")).await.unwrap_err();
        assert!(matches!(err, AgentKvmError::Capture(m) if m.contains("grim")));
    }
}
