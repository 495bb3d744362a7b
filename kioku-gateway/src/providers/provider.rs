//! Provider trait for abstracting generative model backends.

use kioku_core::ChatMessage;
use serde::{Deserialize, Serialize};

/// Token accounting reported by a provider, when available
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Unified response type across providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub id: String,
    pub model: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ProviderUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// Provider error types
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
    #[error("No content in response")]
    NoContent,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}

impl ProviderError {
    /// Transport failures, rate limits, and server errors are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::HttpError(_) => true,
            ProviderError::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Provider trait for different LLM backends
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Current model
    fn model(&self) -> &str;

    /// Send a single-turn message without system instructions.
    async fn send_message(&self, content: &str) -> Result<ProviderResponse, ProviderError> {
        self.send_conversation(None, Vec::new(), content).await
    }

    /// Send prior turns plus a new user message and get the reply
    async fn send_conversation(
        &self,
        system: Option<&str>,
        history: Vec<ChatMessage>,
        new_message: &str,
    ) -> Result<ProviderResponse, ProviderError>;
}
