//! Google Gemini provider.

pub mod client;
pub mod history;

pub use client::GeminiClient;
