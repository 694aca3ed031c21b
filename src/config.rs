//! Process configuration, read from the environment at startup.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default OpenAI-compatible endpoint for the conversational model.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default OpenAI-compatible endpoint for the vision model.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
/// Public PlantUML rendering server.
pub const PLANTUML_SERVER_URL: &str = "http://www.plantuml.com/plantuml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// An environment value could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value found.
        value: String,
    },
    /// A URL setting does not parse.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Conversational model (tool calling).
    pub chat: ModelConfig,
    /// Vision model used by `describe-image`.
    pub vision: ModelConfig,
    /// Backend used by `explain-diagram-source`.
    pub explainer: ExplainerConfig,
    /// Conversation loop limits.
    pub agent: AgentConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Diagram rendering service.
    pub plantuml: PlantUmlConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chat: ModelConfig::default(),
            vision: ModelConfig::groq_vision(),
            explainer: ExplainerConfig::default(),
            agent: AgentConfig::default(),
            server: ServerConfig::default(),
            plantuml: PlantUmlConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset keys keep their defaults.
    ///
    /// Recognised keys: `OPENAI_MODEL`, `OPENAI_KEY` (or `OPENAI_API_KEY`),
    /// `OPENAI_BASE_URL`, `GROQ_MODEL_VISION`, `GROQ_KEY`, `GROQ_BASE_URL`,
    /// `FLOWCHART_TEMPERATURE`, `FLOWCHART_REQUEST_TIMEOUT_SECS`,
    /// `FLOWCHART_EXPLAINER`, `FLOWCHART_OLLAMA_MODEL`, `FLOWCHART_OLLAMA_URL`,
    /// `FLOWCHART_MAX_ROUND_TRIPS`, `FLOWCHART_PORT`, `FLOWCHART_OUT_DIR`,
    /// `FLOWCHART_MAX_UPLOAD_BYTES`, `FLOWCHART_PLANTUML_URL`.
    ///
    /// # Errors
    /// Returns an error if a value cannot be parsed or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(model) = get("OPENAI_MODEL") {
            config.chat.model = model;
        }
        config.chat.api_key = get("OPENAI_KEY").or_else(|| get("OPENAI_API_KEY"));
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.chat.base_url = url;
        }
        if let Some(raw) = get("FLOWCHART_TEMPERATURE") {
            config.chat.temperature = Some(parse_value("FLOWCHART_TEMPERATURE", &raw)?);
        }

        if let Some(model) = get("GROQ_MODEL_VISION") {
            config.vision.model = model;
        }
        config.vision.api_key = get("GROQ_KEY");
        if let Some(url) = get("GROQ_BASE_URL") {
            config.vision.base_url = url;
        }

        if let Some(raw) = get("FLOWCHART_REQUEST_TIMEOUT_SECS") {
            let timeout = Duration::from_secs(parse_value("FLOWCHART_REQUEST_TIMEOUT_SECS", &raw)?);
            config.chat.request_timeout = timeout;
            config.vision.request_timeout = timeout;
            config.explainer.request_timeout = timeout;
            config.plantuml.request_timeout = timeout;
        }

        if let Some(raw) = get("FLOWCHART_EXPLAINER") {
            config.explainer.backend = parse_value("FLOWCHART_EXPLAINER", &raw)?;
        }
        if let Some(model) = get("FLOWCHART_OLLAMA_MODEL") {
            config.explainer.ollama_model = model;
        }
        config.explainer.ollama_base_url = get("FLOWCHART_OLLAMA_URL");

        if let Some(raw) = get("FLOWCHART_MAX_ROUND_TRIPS") {
            config.agent.max_round_trips = parse_value("FLOWCHART_MAX_ROUND_TRIPS", &raw)?;
        }

        if let Some(raw) = get("FLOWCHART_PORT") {
            config.server.port = parse_value("FLOWCHART_PORT", &raw)?;
        }
        if let Some(dir) = get("FLOWCHART_OUT_DIR") {
            config.server.out_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("FLOWCHART_MAX_UPLOAD_BYTES") {
            config.server.max_upload_bytes = parse_value("FLOWCHART_MAX_UPLOAD_BYTES", &raw)?;
        }

        if let Some(url) = get("FLOWCHART_PLANTUML_URL") {
            config.plantuml.server_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        self.chat.validate("chat")?;
        self.vision.validate("vision")?;

        if self.chat.api_key.is_none() && self.chat.base_url.starts_with(OPENAI_BASE_URL) {
            return Err(ConfigError::Invalid(
                "chat.api_key is required for the OpenAI endpoint (set OPENAI_KEY)".to_string(),
            ));
        }

        if self.agent.max_round_trips == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_round_trips must be > 0".to_string(),
            ));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_upload_bytes must be > 0".to_string(),
            ));
        }

        if self.explainer.backend == ExplainerBackend::Ollama {
            if self.explainer.ollama_model.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "explainer.ollama_model must not be empty".to_string(),
                ));
            }
            if self.explainer.request_timeout.is_zero() {
                return Err(ConfigError::Invalid(
                    "explainer.request_timeout must be > 0".to_string(),
                ));
            }
            if let Some(base_url) = &self.explainer.ollama_base_url {
                Url::parse(base_url)?;
            }
        }

        Url::parse(&self.plantuml.server_url)?;
        Ok(())
    }
}

/// Settings for one hosted model on an OpenAI-compatible endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier.
    pub model: String,
    /// Bearer token, if the endpoint needs one.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Sampling temperature; `None` leaves the provider default.
    pub temperature: Option<f64>,
    /// Total request timeout.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: OPENAI_BASE_URL.to_string(),
            temperature: Some(1.0),
            request_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ModelConfig {
    /// Defaults for the Groq vision model.
    #[must_use]
    pub fn groq_vision() -> Self {
        Self {
            model: "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
            base_url: GROQ_BASE_URL.to_string(),
            temperature: None,
            ..Self::default()
        }
    }

    fn validate(&self, section: &str) -> ConfigResult<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{section}.model must not be empty"
            )));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::Invalid(format!(
                    "{section}.temperature must be within 0.0..=2.0"
                )));
            }
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(format!(
                "{section}.request_timeout must be > 0"
            )));
        }

        Url::parse(&self.base_url)?;
        Ok(())
    }
}

/// Which backend explains diagram source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainerBackend {
    /// Reuse the conversational model.
    #[default]
    Chat,
    /// Local model served by Ollama.
    Ollama,
}

impl fmt::Display for ExplainerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for ExplainerBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chat" | "openai" => Ok(Self::Chat),
            "ollama" => Ok(Self::Ollama),
            _ => Err(value.to_string()),
        }
    }
}

/// Explainer settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExplainerConfig {
    /// Selected backend.
    pub backend: ExplainerBackend,
    /// Ollama model name (only used by the Ollama backend).
    pub ollama_model: String,
    /// Optional custom Ollama base URL.
    pub ollama_base_url: Option<String>,
    /// Temperature for Ollama generations.
    pub temperature: f64,
    /// Bound on one Ollama completion.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            backend: ExplainerBackend::Chat,
            ollama_model: "llama3.1:8b".to_string(),
            ollama_base_url: None,
            temperature: 0.4,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Conversation loop limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model invocations within one turn.
    pub max_round_trips: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_round_trips: 10 }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Directory for uploaded images and rendered diagrams.
    pub out_dir: PathBuf,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            out_dir: PathBuf::from("out"),
            max_upload_bytes: 10 * 1024 * 1024, // 10 MiB
        }
    }
}

/// PlantUML rendering service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlantUmlConfig {
    /// Server base URL (the `/png/...` path is appended).
    pub server_url: String,
    /// Request timeout.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for PlantUmlConfig {
    fn default() -> Self {
        Self {
            server_url: PLANTUML_SERVER_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> ConfigResult<T> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

/// Serde module for whole-second durations.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
