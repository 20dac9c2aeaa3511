use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Physical screen size in pixels, as quoted in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Used whenever the platform query fails or prints something unexpected.
    pub const FALLBACK: Resolution = Resolution {
        width: 1920,
        height: 1080,
    };
}

impl Default for Resolution {
    fn default() -> Self {
        Self::FALLBACK
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

static SYSTEM_PROFILER_RES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Resolution: (\d+) x (\d+)").expect("static resolution pattern is valid")
});
static WLR_RANDR_RES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)x(\d+)").expect("static resolution pattern is valid"));
static XDPYINFO_RES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"dimensions:\s+(\d+)x(\d+)").expect("static resolution pattern is valid")
});

fn first_match(re: &Regex, text: &str) -> Option<Resolution> {
    let caps = re.captures(text)?;
    Some(Resolution {
        width: caps.get(1)?.as_str().parse().ok()?,
        height: caps.get(2)?.as_str().parse().ok()?,
    })
}

/// `system_profiler SPDisplaysDataType` output (macOS).
pub fn parse_system_profiler(text: &str) -> Option<Resolution> {
    first_match(&SYSTEM_PROFILER_RES, text)
}

/// `wlr-randr` output (wlroots Wayland compositors); first mode listed wins.
pub fn parse_wlr_randr(text: &str) -> Option<Resolution> {
    first_match(&WLR_RANDR_RES, text)
}

/// `xdpyinfo` output (X11, also XWayland).
pub fn parse_xdpyinfo(text: &str) -> Option<Resolution> {
    first_match(&XDPYINFO_RES, text)
}
