//! Shared configuration and conversation types for kioku.

pub mod config;
pub mod message;

pub use config::{
    Config, ConfigError, EmbeddingProvider, GatewaySettings, GenerationSettings,
    KnowledgeSearchSettings, KnowledgeSettings, KnowledgeToolsSettings, LoggingSettings,
    SearchDefaults, Secrets, SecretsError, Settings, SettingsError, StoreBackend, load_dotenv,
};
pub use message::{ChatMessage, ConversationTurn, MessageRole, ProviderType};
