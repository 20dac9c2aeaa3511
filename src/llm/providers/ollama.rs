use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;

use crate::errors::{AgentKvmError, AgentKvmResult};
use crate::llm::provider::ModelBackend;
use crate::llm::types::{GenerateRequest, GenerateResponse, TagsResponse, SCREEN_AGENT_SAMPLING};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 11434;

const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

/// Substrings that mark a model as (probably) vision-capable.
const VISION_KEYWORDS: &[&str] = &["vision", "llava", "bakllava", "moondream", "minicpm-v", "qwen"];

/// Local Ollama server reached over HTTP.
pub struct OllamaBackend {
    base_url: String,
    model: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(host: &str, port: u16, model: Option<String>) -> Self {
        Self::with_base_url(format!("http://{host}:{port}"), model)
    }

    pub fn with_base_url(base_url: impl Into<String>, model: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            timeout: GENERATE_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn set_model(&mut self, model: String) {
        self.model = Some(model);
    }

    /// Names of installed models, narrowed to likely vision models when any
    /// match. Any failure yields an empty list.
    pub async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/api/tags", self.base_url);
        let result: Result<TagsResponse, reqwest::Error> = async {
            let resp = self
                .client
                .get(&url)
                .timeout(LIST_TIMEOUT)
                .send()
                .await?
                .error_for_status()?;
            resp.json::<TagsResponse>().await
        }
        .await;

        match result {
            Ok(tags) => filter_vision_models(tags.models.into_iter().map(|m| m.name).collect()),
            Err(e) => {
                tracing::debug!(error = %e, url = %url, "failed to list models");
                Vec::new()
            }
        }
    }

    /// Startup probe: true when `/api/tags` answers 200.
    pub async fn check_connection(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::debug!(error = %e, url = %url, "ollama probe failed");
                false
            }
        }
    }

    pub fn build_request(&self, prompt: &str, image_b64: String) -> AgentKvmResult<GenerateRequest> {
        let model = self.model.clone().ok_or_else(|| {
            AgentKvmError::Config("no Ollama model selected (use --model)".into())
        })?;
        Ok(GenerateRequest {
            model,
            prompt: prompt.to_string(),
            images: vec![image_b64],
            stream: false,
            options: SCREEN_AGENT_SAMPLING,
        })
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn call(&self, prompt: &str, screenshot: &Path) -> AgentKvmResult<String> {
        let bytes = tokio::fs::read(screenshot).await?;
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let request = self.build_request(prompt, image_b64)?;
        let url = format!("{}/api/generate", self.base_url);

        tracing::debug!(
            url = %url,
            model = %request.model,
            prompt_chars = prompt.len(),
            image_bytes = bytes.len(),
            "calling ollama"
        );

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentKvmError::BackendUnavailable(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentKvmError::Backend(format!("Ollama returned {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AgentKvmError::BackendUnavailable(format!("Ollama response read failed: {e}")))?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| AgentKvmError::Backend(format!("invalid Ollama response: {e}")))?;
        Ok(parsed.response)
    }
}

/// Keeps models whose name contains a vision keyword; returns the full list
/// when none do.
pub fn filter_vision_models(models: Vec<String>) -> Vec<String> {
    let vision: Vec<String> = models
        .iter()
        .filter(|m| {
            let lower = m.to_lowercase();
            VISION_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .cloned()
        .collect();
    if vision.is_empty() {
        models
    } else {
        vision
    }
}
