use std::sync::Arc;

use tracing::{debug, info};

use crate::KnowledgeSettings;
use crate::embeddings::{Embedder, build_embedder};
use crate::errors::KnowledgeResult;
use crate::models::{DocumentUpdate, KnowledgeDocument, NewDocument, ScoredResult, SearchQuery};
use crate::retriever::Retriever;
use crate::storage::{DocumentStore, open_store};

/// Facade over the embedder, store, and retriever.
///
/// Every write embeds `content` before touching the store, so a failed
/// embedding never leaves a document behind.
#[derive(Clone)]
pub struct KnowledgeEngine {
    settings: KnowledgeSettings,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    retriever: Retriever,
}

impl KnowledgeEngine {
    /// Open the embedder and store selected in settings.
    pub async fn open(settings: KnowledgeSettings) -> KnowledgeResult<Self> {
        let embedder = build_embedder(&settings)?;
        let store = open_store(&settings).await?;
        info!(
            embedder = embedder.name(),
            backend = ?settings.store_backend,
            "knowledge engine ready"
        );
        Ok(Self::with_components(settings, embedder, store))
    }

    /// Assemble an engine from explicitly constructed parts.
    pub fn with_components(
        settings: KnowledgeSettings,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let retriever = Retriever::new(embedder.clone(), store.clone());
        Self {
            settings,
            embedder,
            store,
            retriever,
        }
    }

    pub fn settings(&self) -> &KnowledgeSettings {
        &self.settings
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn create(&self, document: NewDocument) -> KnowledgeResult<String> {
        document.validate()?;
        let embedding = self.embedder.embed(&document.content).await?;
        let id = self.store.insert(document, Some(embedding)).await?;
        debug!(id = %id, "knowledge document created");
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> KnowledgeResult<KnowledgeDocument> {
        self.store.get(id, false).await
    }

    pub async fn list(&self) -> KnowledgeResult<Vec<KnowledgeDocument>> {
        self.store.list_all(false).await
    }

    /// Replace a document's content fields and recompute its embedding.
    pub async fn update(&self, id: &str, update: DocumentUpdate) -> KnowledgeResult<()> {
        update.validate()?;
        // Fail fast on unknown ids before paying for an embedding.
        self.store.get(id, false).await?;
        let embedding = self.embedder.embed(&update.content).await?;
        self.store.update(id, update, embedding).await?;
        debug!(id = %id, "knowledge document updated");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> KnowledgeResult<()> {
        self.store.delete(id).await?;
        debug!(id = %id, "knowledge document deleted");
        Ok(())
    }

    /// Insert records in order. The first failure stops the batch; records
    /// before it stay stored.
    pub async fn ingest(&self, records: Vec<NewDocument>) -> KnowledgeResult<Vec<String>> {
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(self.create(record).await?);
        }
        info!(count = ids.len(), "ingested knowledge records");
        Ok(ids)
    }

    pub async fn retrieve(&self, query: &str, limit: usize) -> KnowledgeResult<Vec<ScoredResult>> {
        self.retriever.retrieve(query, limit).await
    }

    /// Retrieval with the configured default limit.
    pub async fn search(&self, query: SearchQuery) -> KnowledgeResult<Vec<ScoredResult>> {
        let limit = query.limit.unwrap_or(self.settings.search.max_results);
        self.retrieve(&query.query, limit).await
    }
}
