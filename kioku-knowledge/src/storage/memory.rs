use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{DocumentStore, new_document_id};
use crate::embeddings::check_dimension;
use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::models::{DocumentUpdate, KnowledgeDocument, NewDocument};

/// Process-local store, insertion ordered. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: Vec<KnowledgeDocument>,
    embedding_dim: Option<usize>,
}

impl MemoryState {
    fn pin_dim(&mut self, embedding: &[f32]) -> KnowledgeResult<()> {
        check_dimension(self.embedding_dim, embedding)?;
        self.embedding_dim.get_or_insert(embedding.len());
        Ok(())
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn project(document: &KnowledgeDocument, include_embedding: bool) -> KnowledgeDocument {
    if include_embedding {
        document.clone()
    } else {
        KnowledgeDocument {
            embedding: None,
            ..document.clone()
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(
        &self,
        document: NewDocument,
        embedding: Option<Vec<f32>>,
    ) -> KnowledgeResult<String> {
        let mut state = self.state.write().await;
        if let Some(embedding) = &embedding {
            state.pin_dim(embedding)?;
        }

        let id = new_document_id();
        let now = Utc::now().to_rfc3339();
        state.documents.push(KnowledgeDocument {
            id: id.clone(),
            title: document.title,
            content: document.content,
            source: document.source,
            metadata: document.metadata,
            embedding,
            created_at: now.clone(),
            updated_at: now,
        });
        Ok(id)
    }

    async fn get(&self, id: &str, include_embedding: bool) -> KnowledgeResult<KnowledgeDocument> {
        let state = self.state.read().await;
        state
            .documents
            .iter()
            .find(|doc| doc.id == id)
            .map(|doc| project(doc, include_embedding))
            .ok_or_else(|| KnowledgeError::NotFound(id.to_string()))
    }

    async fn list_all(&self, include_embedding: bool) -> KnowledgeResult<Vec<KnowledgeDocument>> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .iter()
            .map(|doc| project(doc, include_embedding))
            .collect())
    }

    async fn update(
        &self,
        id: &str,
        update: DocumentUpdate,
        embedding: Vec<f32>,
    ) -> KnowledgeResult<()> {
        let mut state = self.state.write().await;
        let index = state
            .documents
            .iter()
            .position(|doc| doc.id == id)
            .ok_or_else(|| KnowledgeError::NotFound(id.to_string()))?;
        state.pin_dim(&embedding)?;

        let doc = &mut state.documents[index];
        doc.title = update.title;
        doc.content = update.content;
        doc.source = update.source;
        if let Some(metadata) = update.metadata {
            doc.metadata = metadata;
        }
        doc.embedding = Some(embedding);
        doc.updated_at = Utc::now().to_rfc3339();
        Ok(())
    }

    async fn delete(&self, id: &str) -> KnowledgeResult<()> {
        let mut state = self.state.write().await;
        let before = state.documents.len();
        state.documents.retain(|doc| doc.id != id);
        if state.documents.len() == before {
            return Err(KnowledgeError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn embedding_dim(&self) -> KnowledgeResult<Option<usize>> {
        Ok(self.state.read().await.embedding_dim)
    }
}
