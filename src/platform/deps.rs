// Host tool detection with install hints.
use std::fmt::Write as _;

use crate::config::CliConfig;
use crate::llm::types::BackendKind;
use crate::platform::{DisplayServer, Platform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub program: String,
    pub description: &'static str,
    pub install: &'static str,
}

impl Dependency {
    fn new(name: &str, description: &'static str, install: &'static str) -> Self {
        Self {
            name: name.to_string(),
            program: name.to_string(),
            description,
            install,
        }
    }

    fn entry(&self) -> String {
        format!("  - {}: {}\n    Install: {}", self.name, self.description, self.install)
    }
}

/// Result of a dependency scan; entries are pre-rendered for the terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyReport {
    pub missing_required: Vec<String>,
    pub missing_optional: Vec<String>,
}

impl DependencyReport {
    pub fn is_satisfied(&self) -> bool {
        self.missing_required.is_empty()
    }

    pub fn render_required(&self) -> String {
        let mut out = String::new();
        for entry in &self.missing_required {
            let _ = writeln!(out, "{entry}\n");
        }
        out
    }

    pub fn render_optional(&self) -> String {
        let mut out = String::new();
        for entry in &self.missing_optional {
            let _ = writeln!(out, "{entry}\n");
        }
        out
    }
}

/// The CLI program a subprocess backend needs, if any.
pub fn backend_dependency(kind: BackendKind, cli: &CliConfig) -> Option<Dependency> {
    match kind {
        BackendKind::Ollama => None,
        BackendKind::Codex => Some(Dependency {
            name: "codex".into(),
            program: cli.codex_program.clone(),
            description: "OpenAI Codex CLI",
            install: "npm install -g @openai/codex",
        }),
        BackendKind::Claude => Some(Dependency {
            name: "claude".into(),
            program: cli.claude_program.clone(),
            description: "Claude Code CLI",
            install: "npm install -g @anthropic-ai/claude-code",
        }),
    }
}

fn macos_dependencies() -> Vec<Dependency> {
    vec![
        Dependency::new("cliclick", "Mouse/keyboard automation tool", "brew install cliclick"),
        Dependency::new("screencapture", "Screenshot utility", "Built-in on macOS"),
    ]
}

fn linux_optional_dependencies(display: DisplayServer) -> Vec<Dependency> {
    let mut deps = if display == DisplayServer::Wayland {
        vec![
            Dependency::new(
                "ydotool",
                "Mouse/keyboard automation tool (Wayland)",
                "sudo apt install ydotool && sudo systemctl enable --now ydotool",
            ),
            Dependency::new(
                "xdotool",
                "Mouse/keyboard automation tool (X11)",
                "sudo apt install xdotool (limited on Wayland)",
            ),
            Dependency::new("grim", "Screenshot utility (Wayland)", "sudo apt install grim"),
        ]
    } else {
        vec![
            Dependency::new(
                "xdotool",
                "Mouse/keyboard automation tool (X11)",
                "sudo apt install xdotool",
            ),
            Dependency::new(
                "ydotool",
                "Mouse/keyboard automation tool (Wayland)",
                "sudo apt install ydotool",
            ),
        ]
    };
    deps.extend([
        Dependency::new("scrot", "Screenshot utility (X11)", "sudo apt install scrot"),
        Dependency::new(
            "gnome-screenshot",
            "GNOME screenshot utility",
            "sudo apt install gnome-screenshot",
        ),
        Dependency::new("wl-copy", "Clipboard utility (Wayland)", "sudo apt install wl-clipboard"),
        Dependency::new("xclip", "Clipboard utility (X11)", "sudo apt install xclip"),
    ]);
    deps
}

const LINUX_SCREENSHOT_TOOLS: &[&str] = &["grim", "scrot", "gnome-screenshot", "import"];

/// Scans for the tools the platform and backend need. `exists` is usually
/// [`crate::platform::command_exists`].
pub fn check_dependencies(
    platform: Platform,
    display: Option<DisplayServer>,
    backend: Option<&Dependency>,
    exists: impl Fn(&str) -> bool,
) -> DependencyReport {
    let mut report = DependencyReport::default();

    match platform {
        Platform::MacOs => {
            for dep in macos_dependencies() {
                if !exists(&dep.program) {
                    report.missing_required.push(dep.entry());
                }
            }
        }
        Platform::Linux => {
            let display = display.unwrap_or(DisplayServer::X11);
            for dep in linux_optional_dependencies(display) {
                if !exists(&dep.program) {
                    report.missing_optional.push(dep.entry());
                }
            }

            if !exists("ydotool") && !exists("xdotool") {
                report.missing_required.push(
                    "  - Input tool (install ONE of the following):\n    \
                     - ydotool: sudo apt install ydotool (recommended for Wayland)\n    \
                     - xdotool: sudo apt install xdotool (for X11)"
                        .to_string(),
                );
            }

            if !LINUX_SCREENSHOT_TOOLS.iter().any(|t| exists(t)) {
                let hint = if display == DisplayServer::Wayland {
                    "  - Screenshot tool (install ONE of the following):\n    \
                     - grim: sudo apt install grim (recommended for Wayland)\n    \
                     - gnome-screenshot: sudo apt install gnome-screenshot"
                } else {
                    "  - Screenshot tool (install ONE of the following):\n    \
                     - scrot: sudo apt install scrot (recommended)\n    \
                     - gnome-screenshot: sudo apt install gnome-screenshot\n    \
                     - import: sudo apt install imagemagick"
                };
                report.missing_required.push(hint.to_string());
            }
        }
    }

    if let Some(dep) = backend {
        if !exists(&dep.program) {
            report.missing_required.push(dep.entry());
        }
    }

    report
}
