// Workspace layout: current screenshot/response, their rotated copies,
// per-command logs and the history ledger.
use std::path::{Path, PathBuf};

use crate::errors::AgentKvmResult;

pub const SCREENSHOT_FILE: &str = "currentscreen.png";
pub const RESPONSE_FILE: &str = "currentscreen.md";
pub const PAST_DIR: &str = "past_screens";
pub const LOG_DIR: &str = "logs";
pub const HISTORY_JSON: &str = "action_history.json";
pub const HISTORY_TXT: &str = "action_history.txt";

/// Second-resolution local timestamp used in artifact file names.
pub fn file_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn screenshot_path(&self) -> PathBuf {
        self.root.join(SCREENSHOT_FILE)
    }

    pub fn response_path(&self) -> PathBuf {
        self.root.join(RESPONSE_FILE)
    }

    pub fn past_dir(&self) -> PathBuf {
        self.root.join(PAST_DIR)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR)
    }

    pub fn history_json(&self) -> PathBuf {
        self.root.join(HISTORY_JSON)
    }

    pub fn history_txt(&self) -> PathBuf {
        self.root.join(HISTORY_TXT)
    }

    pub fn ensure_dirs(&self) -> AgentKvmResult<()> {
        std::fs::create_dir_all(self.past_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }

    /// Moves last iteration's screenshot and response into `past_screens/`.
    pub fn rotate_previous(&self) -> AgentKvmResult<()> {
        self.rotate(&self.screenshot_path(), "screen")?;
        self.rotate(&self.response_path(), "model")?;
        Ok(())
    }

    fn rotate(&self, path: &Path, prefix: &str) -> AgentKvmResult<Option<PathBuf>> {
        if !path.exists() {
            return Ok(None);
        }
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let dest = self.past_dir().join(format!("{prefix}_{}{ext}", file_timestamp()));
        std::fs::rename(path, &dest)?;
        tracing::debug!(from = %path.display(), to = %dest.display(), "rotated artifact");
        Ok(Some(dest))
    }

    pub fn write_response(&self, text: &str) -> AgentKvmResult<()> {
        std::fs::write(self.response_path(), text)?;
        Ok(())
    }

    /// Keeps a rejected response for inspection as `model_invalid_<ts>.md`.
    pub fn archive_invalid_response(&self) -> AgentKvmResult<PathBuf> {
        let dest = self
            .past_dir()
            .join(format!("model_invalid_{}.md", file_timestamp()));
        std::fs::rename(self.response_path(), &dest)?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        ws.ensure_dirs().unwrap();
        (dir, ws)
    }

    #[test]
    fn ensure_dirs_creates_layout() {
        let (_dir, ws) = workspace();
        assert!(ws.past_dir().is_dir());
        assert!(ws.log_dir().is_dir());
    }

    #[test]
    fn rotation_moves_current_artifacts() {
        let (_dir, ws) = workspace();
        std::fs::write(ws.screenshot_path(), b"png").unwrap();
        ws.write_response("###OBS\nx").unwrap();

        ws.rotate_previous().unwrap();

        assert!(!ws.screenshot_path().exists());
        assert!(!ws.response_path().exists());
        let mut names: Vec<String> = std::fs::read_dir(ws.past_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("model_") && names[0].ends_with(".md"));
        assert!(names[1].starts_with("screen_") && names[1].ends_with(".png"));
    }

    #[test]
    fn rotation_without_artifacts_is_a_no_op() {
        let (_dir, ws) = workspace();
        ws.rotate_previous().unwrap();
        assert_eq!(std::fs::read_dir(ws.past_dir()).unwrap().count(), 0);
    }

    #[test]
    fn invalid_response_is_archived() {
        let (_dir, ws) = workspace();
        ws.write_response("###CMD\nrm -rf /").unwrap();
        let dest = ws.archive_invalid_response().unwrap();
        assert!(!ws.response_path().exists());
        assert!(dest
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("model_invalid_"));
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "###CMD\nrm -rf /");
    }
}
