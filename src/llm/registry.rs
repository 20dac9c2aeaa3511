use std::time::Duration;

use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;

use crate::config::BackendConfig;
use crate::errors::{AgentKvmError, AgentKvmResult};
use crate::llm::provider::Backend;
use crate::llm::providers::cli::CliBackend;
use crate::llm::providers::ollama::{OllamaBackend, DEFAULT_HOST, DEFAULT_PORT};
use crate::llm::types::BackendKind;

/// Connection parameters after CLI flags, environment and `config.toml`
/// have been merged (flags and env win).
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub host: String,
    pub port: u16,
    pub model: Option<String>,
    pub generate_timeout: Duration,
    pub codex_program: String,
    pub claude_program: String,
    pub cli_timeout: Duration,
}

impl BackendSettings {
    pub fn resolve(
        config: &BackendConfig,
        kind: Option<BackendKind>,
        host: Option<String>,
        port: Option<u16>,
        model: Option<String>,
    ) -> Self {
        Self {
            kind: kind.unwrap_or(config.kind),
            host: host
                .or_else(|| config.ollama.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: port.or(config.ollama.port).unwrap_or(DEFAULT_PORT),
            model: model.or_else(|| config.ollama.model.clone()),
            generate_timeout: Duration::from_secs(config.ollama.timeout_secs),
            codex_program: config.cli.codex_program.clone(),
            claude_program: config.cli.claude_program.clone(),
            cli_timeout: Duration::from_secs(config.cli.timeout_secs),
        }
    }
}

/// Builds the configured backend and runs its one-time setup.
///
/// For Ollama that means probing the server and, when no model is
/// configured, asking the user to pick one. CLI backends need no setup.
pub async fn connect_backend(settings: &BackendSettings) -> AgentKvmResult<Backend> {
    match settings.kind {
        BackendKind::Ollama => {
            let mut backend = OllamaBackend::new(&settings.host, settings.port, settings.model.clone())
                .with_timeout(settings.generate_timeout);

            if !backend.check_connection().await {
                return Err(AgentKvmError::BackendUnavailable(format!(
                    "cannot connect to Ollama at {}:{} (make sure Ollama is running: ollama serve)",
                    settings.host, settings.port
                )));
            }

            if backend.model().is_none() {
                let models = backend.list_models().await;
                let model = select_model_interactive(&models)?;
                backend.set_model(model);
            }

            tracing::info!(
                model = backend.model().unwrap_or_default(),
                url = %backend.base_url(),
                "using Ollama model"
            );
            Ok(Backend::Ollama(backend))
        }
        BackendKind::Codex => Ok(Backend::Codex(
            CliBackend::codex(settings.codex_program.clone()).with_timeout(settings.cli_timeout),
        )),
        BackendKind::Claude => Ok(Backend::Claude(
            CliBackend::claude(settings.claude_program.clone()).with_timeout(settings.cli_timeout),
        )),
    }
}

/// Terminal menu over the available vision models.
pub fn select_model_interactive(models: &[String]) -> AgentKvmResult<String> {
    if models.is_empty() {
        return Err(AgentKvmError::Config(
            "no models found; pull a vision model first:\n  ollama pull llava\n  \
             ollama pull moondream\n  ollama pull minicpm-v"
                .into(),
        ));
    }

    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a vision model")
        .items(models)
        .default(0)
        .interact_opt()
        .map_err(|e| AgentKvmError::Config(format!("model selection failed: {e}")))?
        .ok_or_else(|| AgentKvmError::Config("model selection cancelled".into()))?;

    Ok(models[index].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::llm::provider::ModelBackend;

    #[test]
    fn flags_override_config_values() {
        let mut config = BackendConfig::default();
        config.ollama.host = Some("gpu-box".into());
        config.ollama.port = Some(1234);
        config.ollama.model = Some("llava".into());

        let from_file = BackendSettings::resolve(&config, None, None, None, None);
        assert_eq!(from_file.kind, BackendKind::Ollama);
        assert_eq!(from_file.host, "gpu-box");
        assert_eq!(from_file.port, 1234);
        assert_eq!(from_file.model.as_deref(), Some("llava"));

        let overridden = BackendSettings::resolve(
            &config,
            Some(BackendKind::Codex),
            Some("10.0.0.2".into()),
            Some(11434),
            Some("moondream".into()),
        );
        assert_eq!(overridden.kind, BackendKind::Codex);
        assert_eq!(overridden.host, "10.0.0.2");
        assert_eq!(overridden.port, 11434);
        assert_eq!(overridden.model.as_deref(), Some("moondream"));
    }

    #[test]
    fn defaults_point_at_local_ollama() {
        let settings = BackendSettings::resolve(&BackendConfig::default(), None, None, None, None);
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 11434);
        assert!(settings.model.is_none());
        assert_eq!(settings.generate_timeout, Duration::from_secs(120));
    }

    #[test]
    fn no_models_is_an_error() {
        assert!(matches!(
            select_model_interactive(&[]),
            Err(AgentKvmError::Config(_))
        ));
    }

    #[tokio::test]
    async fn cli_backends_need_no_setup() {
        let mut settings = BackendSettings::resolve(&BackendConfig::default(), None, None, None, None);
        settings.kind = BackendKind::Claude;
        let backend = connect_backend(&settings).await.unwrap();
        assert_eq!(backend.name(), "claude");
        assert!(matches!(backend, Backend::Claude(_)));
    }

    #[tokio::test]
    async fn unreachable_ollama_fails_setup() {
        let mut settings = BackendSettings::resolve(&BackendConfig::default(), None, None, None, None);
        settings.host = "127.0.0.1".into();
        settings.port = 9;
        settings.model = Some("llava".into());
        let err = connect_backend(&settings).await.err().unwrap();
        assert!(matches!(err, AgentKvmError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn configured_model_skips_selection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models":[]}"#)
            .create_async()
            .await;
        let url = server.url();
        let addr = url.trim_start_matches("http://");
        let (host, port) = addr.rsplit_once(':').unwrap();

        let mut settings = BackendSettings::resolve(&BackendConfig::default(), None, None, None, None);
        settings.host = host.to_string();
        settings.port = port.parse().unwrap();
        settings.model = Some("llava".into());

        match connect_backend(&settings).await.unwrap() {
            Backend::Ollama(b) => assert_eq!(b.model(), Some("llava")),
            _ => panic!("expected the Ollama backend"),
        }
    }
}
