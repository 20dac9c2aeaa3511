use std::path::Path;

use async_trait::async_trait;

use crate::errors::AgentKvmResult;
use crate::perception::types::Resolution;

/// Where the loop gets its view of the desktop.
#[async_trait]
pub trait ScreenSource: Send + Sync {
    /// Writes a PNG of the full screen to `dest`.
    async fn capture(&self, dest: &Path) -> AgentKvmResult<()>;

    /// Screen size; implementations fall back to [`Resolution::FALLBACK`].
    async fn resolution(&self) -> Resolution;
}
