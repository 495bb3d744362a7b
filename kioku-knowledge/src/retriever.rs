//! Top-k retrieval over the knowledge store.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::embeddings::Embedder;
use crate::errors::KnowledgeResult;
use crate::models::{KnowledgeDocument, ScoredResult};
use crate::similarity::cosine_similarity;
use crate::storage::DocumentStore;

/// Score `documents` against `query` and keep the best `limit`.
///
/// Documents without an embedding are skipped. The sort is stable, so equal
/// scores keep the order of `documents`. Returned documents carry no
/// embedding.
pub fn rank_by_similarity(
    query: &[f32],
    documents: Vec<KnowledgeDocument>,
    limit: usize,
) -> KnowledgeResult<Vec<ScoredResult>> {
    let mut scored = Vec::with_capacity(documents.len());
    for mut document in documents {
        let Some(embedding) = document.embedding.take() else {
            continue;
        };
        if embedding.is_empty() {
            continue;
        }
        let score = cosine_similarity(query, &embedding)?;
        scored.push(ScoredResult { document, score });
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
    Ok(scored)
}

/// Embeds queries and asks the store for the nearest documents.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn DocumentStore>) -> Self {
        Self { embedder, store }
    }

    pub async fn retrieve(&self, query: &str, limit: usize) -> KnowledgeResult<Vec<ScoredResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;
        let results = self.store.nearest(&vector, limit).await?;
        debug!(
            embedder = self.embedder.name(),
            limit,
            hits = results.len(),
            "retrieved knowledge documents"
        );
        Ok(results)
    }
}
