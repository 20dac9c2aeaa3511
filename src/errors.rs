use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentKvmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Missing required dependencies:\n{0}")]
    MissingDependencies(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Command rejected: {0}")]
    ValidationRejected(String),

    #[error("Screen capture error: {0}")]
    Capture(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl AgentKvmError {
    /// The message without its category prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Config(m)
            | Self::UnsupportedPlatform(m)
            | Self::MissingDependencies(m)
            | Self::BackendUnavailable(m)
            | Self::Backend(m)
            | Self::ValidationRejected(m)
            | Self::Capture(m)
            | Self::Ledger(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

pub type AgentKvmResult<T> = Result<T, AgentKvmError>;
