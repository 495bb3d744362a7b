use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{KnowledgeError, KnowledgeResult};

/// Open key/value metadata attached to a document. Opaque to retrieval.
pub type Metadata = Map<String, Value>;

/// A stored knowledge document.
///
/// `embedding` is `None` either because the document has not been indexed
/// or because the read projected it away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: String,
    pub updated_at: String,
}

impl KnowledgeDocument {
    /// Drop the embedding before handing the document to a caller.
    pub fn without_embedding(mut self) -> Self {
        self.embedding = None;
        self
    }
}

/// Fields of a document to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewDocument {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn validate(&self) -> KnowledgeResult<()> {
        require_text("title", &self.title)?;
        require_text("content", &self.content)
    }
}

/// Full replacement of a document's content fields.
///
/// `metadata: None` keeps whatever metadata is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentUpdate {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl DocumentUpdate {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source: None,
            metadata: None,
        }
    }

    pub fn validate(&self) -> KnowledgeResult<()> {
        require_text("title", &self.title)?;
        require_text("content", &self.content)
    }
}

fn require_text(field: &str, value: &str) -> KnowledgeResult<()> {
    if value.trim().is_empty() {
        return Err(KnowledgeError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Retrieval query with an optional result limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchQuery {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// A retrieved document paired with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub document: KnowledgeDocument,
    pub score: f32,
}

/// Provenance entry returned with a generated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub title: String,
    pub content: String,
    pub source: Option<String>,
}
