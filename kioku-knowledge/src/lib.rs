//! Document store and retrieval pipeline for kioku.

pub mod context;
pub mod embeddings;
pub mod engine;
pub mod errors;
pub mod ingest;
pub mod models;
pub mod paths;
pub mod retriever;
pub mod similarity;
pub mod storage;

pub use kioku_core::config::{KnowledgeSettings, SearchDefaults};
pub use embeddings::{Embedder, EmbeddingClient, HashingEmbedder};
pub use engine::KnowledgeEngine;
pub use errors::{KnowledgeError, KnowledgeResult};
pub use models::{
    DocumentUpdate, KnowledgeDocument, Metadata, NewDocument, ScoredResult, SearchQuery,
    SourceAttribution,
};
pub use retriever::Retriever;
pub use storage::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore};
