//! Knowledge system configuration types.
//!
//! These types define the resolved (non-optional) settings used by
//! `kioku-knowledge`. They are created from the user-facing
//! `KnowledgeToolsSettings` TOML structs via `From`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::settings::{KnowledgeSearchSettings, KnowledgeToolsSettings};

/// Which embedder backs the knowledge engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Ollama-compatible `/api/embed` HTTP endpoint.
    #[default]
    Ollama,
    /// Built-in offline feature-hashing embedder.
    Hashing,
}

/// Where documents are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Resolved knowledge engine settings (all values filled with defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSettings {
    #[serde(default)]
    pub embedding_provider: EmbeddingProvider,
    #[serde(default = "default_embedding_url")]
    pub embedding_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Expected vector length. `None` accepts whatever the first embedding
    /// produces and pins the store to it.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: Option<usize>,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_embedding_timeout_seconds")]
    pub embedding_timeout_seconds: u64,
    #[serde(default)]
    pub store_backend: StoreBackend,
    #[serde(default)]
    pub db_path_override: Option<PathBuf>,
    #[serde(default)]
    pub search: SearchDefaults,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            embedding_provider: EmbeddingProvider::default(),
            embedding_url: default_embedding_url(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
            max_input_chars: default_max_input_chars(),
            embedding_timeout_seconds: default_embedding_timeout_seconds(),
            store_backend: StoreBackend::default(),
            db_path_override: None,
            search: SearchDefaults::default(),
        }
    }
}

/// Resolved search tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDefaults {
    /// Result count when a query does not specify one.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Characters of content kept in a source attribution.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    /// Attributions returned alongside a chat answer.
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            preview_chars: default_preview_chars(),
            max_sources: default_max_sources(),
        }
    }
}

fn default_embedding_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

fn default_embedding_dim() -> Option<usize> {
    Some(384)
}

fn default_max_input_chars() -> usize {
    8192
}

fn default_embedding_timeout_seconds() -> u64 {
    60
}

fn default_max_results() -> usize {
    5
}

fn default_preview_chars() -> usize {
    200
}

fn default_max_sources() -> usize {
    5
}

impl From<&KnowledgeToolsSettings> for KnowledgeSettings {
    fn from(value: &KnowledgeToolsSettings) -> Self {
        let mut settings = KnowledgeSettings::default();
        if let Some(provider) = value.embedding_provider {
            settings.embedding_provider = provider;
        }
        if let Some(url) = &value.embedding_url {
            settings.embedding_url = url.clone();
        }
        if let Some(model) = &value.embedding_model {
            settings.embedding_model = model.clone();
        }
        if let Some(dim) = value.embedding_dim {
            settings.embedding_dim = Some(dim);
        }
        if let Some(chars) = value.max_input_chars {
            settings.max_input_chars = chars;
        }
        if let Some(seconds) = value.embedding_timeout_seconds {
            settings.embedding_timeout_seconds = seconds;
        }
        if let Some(backend) = value.store_backend {
            settings.store_backend = backend;
        }
        if let Some(path) = &value.db_path {
            settings.db_path_override = Some(PathBuf::from(path));
        }
        apply_search_overrides(&mut settings.search, &value.search);
        settings
    }
}

fn apply_search_overrides(search: &mut SearchDefaults, overrides: &KnowledgeSearchSettings) {
    if let Some(max_results) = overrides.max_results {
        search.max_results = max_results;
    }
    if let Some(preview_chars) = overrides.preview_chars {
        search.preview_chars = preview_chars;
    }
    if let Some(max_sources) = overrides.max_sources {
        search.max_sources = max_sources;
    }
}
