use std::path::Path;

use async_trait::async_trait;

use crate::errors::AgentKvmResult;
use crate::llm::providers::cli::CliBackend;
use crate::llm::providers::ollama::OllamaBackend;

/// The one capability every model backend offers: turn a prompt and a
/// screenshot into raw model text.
///
/// Implementations never substitute a default response; any failure is
/// returned and the caller treats it as fatal to the run.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn call(&self, prompt: &str, screenshot: &Path) -> AgentKvmResult<String>;
}

/// Closed set of supported backends. Adding a backend means adding a variant.
pub enum Backend {
    Ollama(OllamaBackend),
    Codex(CliBackend),
    Claude(CliBackend),
}

#[async_trait]
impl ModelBackend for Backend {
    fn name(&self) -> &str {
        match self {
            Self::Ollama(b) => b.name(),
            Self::Codex(b) | Self::Claude(b) => b.name(),
        }
    }

    async fn call(&self, prompt: &str, screenshot: &Path) -> AgentKvmResult<String> {
        match self {
            Self::Ollama(b) => b.call(prompt, screenshot).await,
            Self::Codex(b) | Self::Claude(b) => b.call(prompt, screenshot).await,
        }
    }
}
