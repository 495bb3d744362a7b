//! Settings configuration loaded from TOML files.
//!
//! This module handles non-sensitive configuration stored in TOML format
//! in the XDG config directory (~/.config/kioku/config.toml).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::knowledge::{EmbeddingProvider, StoreBackend};
use crate::message::ProviderType;

/// Default TOML configuration file content
const DEFAULT_CONFIG_TOML: &str = r#"# kioku configuration file
# Located at: ~/.config/kioku/config.toml
#
# This file contains non-sensitive configuration.
# Secrets (API keys) are loaded from environment variables:
#   - GEMINI_API_KEY

[gateway]
host = "127.0.0.1"
port = 8000

[logging]
level = "info"

[generation]
provider = "gemini"
model = "gemini-2.5-flash"
timeout_seconds = 120
retries = 2
retry_backoff_ms = 500
# instructions = "Based on the following information, please answer the user's question."

[knowledge]
# "ollama" calls an Ollama-compatible /api/embed endpoint,
# "hashing" uses the built-in offline embedder.
embedding_provider = "ollama"
embedding_url = "http://127.0.0.1:11434"
embedding_model = "all-minilm"
embedding_dim = 384
max_input_chars = 8192
# "sqlite" or "memory"
store_backend = "sqlite"
# db_path = "/var/lib/kioku/knowledge.sqlite3"

[knowledge.search]
max_results = 5
preview_chars = 200
max_sources = 5
"#;

/// Settings loaded from TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Gateway server configuration
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Generative model configuration
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Knowledge store and retrieval configuration
    #[serde(default)]
    pub knowledge: KnowledgeToolsSettings,
}

/// Gateway server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySettings {
    /// Host to bind to
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace), overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Generative model settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationSettings {
    /// Provider type
    #[serde(default = "default_generation_provider")]
    pub provider: ProviderType,

    /// Model identifier
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// HTTP timeout for one generation request
    #[serde(default = "default_generation_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Extra attempts after a retryable provider failure
    #[serde(default = "default_generation_retries")]
    pub retries: u32,

    /// Initial backoff between attempts, doubled after each failure
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Instruction block placed before the retrieved context
    #[serde(default = "default_instructions")]
    pub instructions: String,
}

/// Knowledge configuration as written in the TOML file.
///
/// Every field is optional; `KnowledgeSettings::from` fills in defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KnowledgeToolsSettings {
    /// Which embedder to use
    pub embedding_provider: Option<EmbeddingProvider>,

    /// Embedding provider base URL
    pub embedding_url: Option<String>,

    /// Embedding model name
    pub embedding_model: Option<String>,

    /// Embedding dimension
    pub embedding_dim: Option<usize>,

    /// Largest input (in characters) accepted by the embedder
    pub max_input_chars: Option<usize>,

    /// HTTP timeout for embedding requests
    pub embedding_timeout_seconds: Option<u64>,

    /// Document store backend
    pub store_backend: Option<StoreBackend>,

    /// Optional override for the SQLite database path
    pub db_path: Option<String>,

    /// Search defaults
    #[serde(default)]
    pub search: KnowledgeSearchSettings,
}

/// Knowledge search defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KnowledgeSearchSettings {
    pub max_results: Option<usize>,
    pub preview_chars: Option<usize>,
    pub max_sources: Option<usize>,
}

// Default value functions
fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_generation_provider() -> ProviderType {
    ProviderType::Gemini
}

fn default_generation_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_generation_timeout_seconds() -> u64 {
    120
}

fn default_generation_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_instructions() -> String {
    "Based on the following information, please answer the user's question. \
     If the answer is not in the provided context, say so plainly instead of guessing. \
     Be humble and never overshare. Answer in the language of the user's question."
        .to_string()
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            timeout_seconds: default_generation_timeout_seconds(),
            retries: default_generation_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            instructions: default_instructions(),
        }
    }
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load settings from a specific path, creating the default file if missing.
    pub fn load_from_path(config_path: &Path) -> Result<Self, SettingsError> {
        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(config_path)?;
        }

        let content = fs::read_to_string(config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Get the configuration file path.
    ///
    /// Uses `KIOKU_CONFIG_DIR` when set, else `~/.config/kioku/config.toml`.
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("KIOKU_CONFIG_DIR") {
            return Ok(PathBuf::from(override_dir).join("config.toml"));
        }

        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("kioku");
        Ok(config_dir.join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG_TOML)?;
        Ok(())
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}
