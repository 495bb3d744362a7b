//! HTTP gateway and answer generation for kioku.

pub mod chat;
pub mod providers;
pub mod server;
pub mod state;

pub use chat::{AnswerGenerator, AnswerSettings, ChatAnswer, ChatError};
pub use providers::{Provider, ProviderError, ProviderResponse, ProviderUsage};
pub use state::AppState;
