//! Conversion between kioku chat history and Gemini API format.

use kioku_core::{ChatMessage, MessageRole};
use serde::{Deserialize, Serialize};

/// Gemini API content structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

/// Gemini API content part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiPart {
    pub text: String,
}

fn gemini_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "model",
    }
}

/// Convert history plus the new user message to Gemini contents.
///
/// Empty messages are dropped since Gemini rejects parts without text.
pub fn to_gemini_contents(history: Vec<ChatMessage>, new_message: &str) -> Vec<GeminiContent> {
    history
        .into_iter()
        .chain(std::iter::once(ChatMessage::user(new_message)))
        .filter(|msg| !msg.content.is_empty())
        .map(|msg| GeminiContent {
            role: gemini_role(msg.role).to_string(),
            parts: vec![GeminiPart { text: msg.content }],
        })
        .collect()
}
