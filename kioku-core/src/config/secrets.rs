//! Secrets configuration loaded from environment variables only.
//!
//! API keys are never read from or written to the TOML settings file.

use std::env;

use crate::message::ProviderType;

/// Secrets loaded exclusively from environment variables.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Google Gemini API key (env: GEMINI_API_KEY, falls back to GOOGLE_API_KEY)
    pub gemini_api_key: Option<String>,
}

/// Errors that can occur when loading secrets
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("No provider API key configured. Set GEMINI_API_KEY")]
    NoProviderConfigured,
}

impl Secrets {
    /// Load secrets from environment variables.
    ///
    /// This function also loads .env file if present (for development),
    /// but production should rely on actual environment variables.
    pub fn from_env() -> Result<Self, SecretsError> {
        let _ = dotenvy::dotenv();

        Self::from_env_inner()
    }

    /// Internal method to load from environment without loading .env
    pub(crate) fn from_env_inner() -> Result<Self, SecretsError> {
        let secrets = Self {
            gemini_api_key: non_empty_var("GEMINI_API_KEY")
                .or_else(|| non_empty_var("GOOGLE_API_KEY")),
        };

        if secrets.gemini_api_key.is_none() {
            return Err(SecretsError::NoProviderConfigured);
        }

        Ok(secrets)
    }

    /// Check if a specific provider is available
    pub fn has_provider_type(&self, provider: ProviderType) -> bool {
        match provider {
            ProviderType::Gemini => self.gemini_api_key.is_some(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
