//! Configuration management for kioku.
//!
//! This module provides a unified configuration system that separates
//! secrets (from environment variables) from settings (from TOML files).
//!
//! # Configuration Sources
//!
//! ## Secrets (Environment Variables)
//! - `GEMINI_API_KEY` - Google Gemini API key
//!
//! ## Settings (TOML File)
//! Located at `~/.config/kioku/config.toml`:
//! ```toml
//! [gateway]
//! host = "127.0.0.1"
//! port = 8000
//!
//! [generation]
//! provider = "gemini"
//! model = "gemini-2.5-flash"
//!
//! [knowledge]
//! embedding_provider = "ollama"
//! embedding_model = "all-minilm"
//! embedding_dim = 384
//!
//! [logging]
//! level = "info"
//! ```

pub mod knowledge;
mod secrets;
mod settings;

use crate::message::ProviderType;

pub use knowledge::{EmbeddingProvider, KnowledgeSettings, SearchDefaults, StoreBackend};
pub use secrets::{Secrets, SecretsError};
pub use settings::{
    GatewaySettings, GenerationSettings, KnowledgeSearchSettings, KnowledgeToolsSettings,
    LoggingSettings, Settings, SettingsError,
};

/// Combined configuration containing both secrets and settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secrets loaded from environment variables
    pub secrets: Secrets,
    /// Settings loaded from TOML configuration file
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Generation provider '{0}' has no configured API key")]
    ProviderNotConfigured(ProviderType),
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No provider API key is configured
    /// - The configured generation provider has no key
    /// - The TOML file cannot be read or parsed
    pub fn load() -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env()?;
        let settings = Settings::load()?;
        Self::from_parts(secrets, settings)
    }

    /// Validate an already loaded pair of secrets and settings.
    pub fn from_parts(secrets: Secrets, settings: Settings) -> Result<Self, ConfigError> {
        let provider = settings.generation.provider;
        if !secrets.has_provider_type(provider) {
            return Err(ConfigError::ProviderNotConfigured(provider));
        }
        Ok(Self { secrets, settings })
    }

    /// Get the generation provider.
    pub fn generation_provider(&self) -> ProviderType {
        self.settings.generation.provider
    }

    /// Get the generation model identifier.
    pub fn generation_model(&self) -> &str {
        &self.settings.generation.model
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        self.settings.bind_addr()
    }

    /// Get the Gemini API key (if configured).
    pub fn gemini_api_key(&self) -> Option<&str> {
        self.secrets.gemini_api_key.as_deref()
    }

    /// Resolved knowledge engine settings.
    pub fn knowledge_settings(&self) -> KnowledgeSettings {
        KnowledgeSettings::from(&self.settings.knowledge)
    }
}

/// Load .env file if it exists (for development convenience).
///
/// This is called automatically by `Config::load()` but is also
/// exposed for live tests that build clients directly.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}
