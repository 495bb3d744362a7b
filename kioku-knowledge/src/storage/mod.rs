//! Knowledge store adapters.
//!
//! [`DocumentStore`] is the only path to persistent state. The engine and
//! retriever hold an `Arc<dyn DocumentStore>` and never touch SQL directly.

use std::sync::Arc;

use async_trait::async_trait;
use kioku_core::StoreBackend;
use tracing::info;

use crate::KnowledgeSettings;
use crate::errors::KnowledgeResult;
use crate::models::{DocumentUpdate, KnowledgeDocument, NewDocument, ScoredResult};
use crate::paths::knowledge_db_path;
use crate::retriever::rank_by_similarity;

mod memory;
mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a new document under a freshly generated id.
    ///
    /// `embedding: None` stores an unindexed document that retrieval skips.
    async fn insert(
        &self,
        document: NewDocument,
        embedding: Option<Vec<f32>>,
    ) -> KnowledgeResult<String>;

    async fn get(&self, id: &str, include_embedding: bool) -> KnowledgeResult<KnowledgeDocument>;

    /// All documents in store-native order.
    async fn list_all(&self, include_embedding: bool) -> KnowledgeResult<Vec<KnowledgeDocument>>;

    /// Replace content fields and embedding of an existing document in one write.
    async fn update(
        &self,
        id: &str,
        update: DocumentUpdate,
        embedding: Vec<f32>,
    ) -> KnowledgeResult<()>;

    async fn delete(&self, id: &str) -> KnowledgeResult<()>;

    /// Embedding length pinned by the first indexed write, if any.
    async fn embedding_dim(&self) -> KnowledgeResult<Option<usize>>;

    /// Top `limit` documents by cosine similarity to `query`.
    ///
    /// The default is a full scan. An indexed store may override it but must
    /// keep the ordering: descending score, ties in `list_all` order.
    async fn nearest(&self, query: &[f32], limit: usize) -> KnowledgeResult<Vec<ScoredResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let documents = self.list_all(true).await?;
        rank_by_similarity(query, documents, limit)
    }
}

/// Open the store backend selected in settings.
pub async fn open_store(settings: &KnowledgeSettings) -> KnowledgeResult<Arc<dyn DocumentStore>> {
    match settings.store_backend {
        StoreBackend::Sqlite => {
            let path = knowledge_db_path(settings)?;
            info!("Opening knowledge store at {}", path.display());
            Ok(Arc::new(SqliteDocumentStore::open(&path).await?))
        }
        StoreBackend::Memory => {
            info!("Using in-memory knowledge store");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
    }
}

pub(crate) fn new_document_id() -> String {
    format!("kn_{}", uuid::Uuid::new_v4().simple())
}
