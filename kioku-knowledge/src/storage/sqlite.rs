use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};

use super::{DocumentStore, new_document_id};
use crate::embeddings::check_dimension;
use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::models::{DocumentUpdate, KnowledgeDocument, Metadata, NewDocument};

/// SQLite-backed store. Embeddings are kept as JSON arrays next to the row.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub async fn open(db_path: &Path) -> KnowledgeResult<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA synchronous = NORMAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA cache_size = -64000")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Private database that lives as long as the store.
    pub async fn open_in_memory() -> KnowledgeResult<Self> {
        let options = SqliteConnectOptions::new().filename(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> KnowledgeResult<Self> {
        sqlx::migrate!("./migrations/knowledge").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    title: String,
    content: String,
    source: Option<String>,
    metadata_json: String,
    embedding_json: Option<String>,
    created_at: String,
    updated_at: String,
}

impl DocumentRow {
    fn into_document(self, include_embedding: bool) -> KnowledgeResult<KnowledgeDocument> {
        let metadata: Metadata = serde_json::from_str(&self.metadata_json)?;
        let embedding = match (include_embedding, self.embedding_json) {
            (true, Some(raw)) => Some(serde_json::from_str::<Vec<f32>>(&raw)?),
            _ => None,
        };
        Ok(KnowledgeDocument {
            id: self.id,
            title: self.title,
            content: self.content,
            source: self.source,
            metadata,
            embedding,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_BY_ID: &str = "SELECT id, title, content, source, metadata_json, embedding_json, created_at, updated_at
     FROM documents WHERE id = ?";
const SELECT_ALL: &str = "SELECT id, title, content, source, metadata_json, embedding_json, created_at, updated_at
     FROM documents ORDER BY rowid";

/// Pin the store dimension on first write and compare on every later one.
async fn pin_dimension(
    tx: &mut Transaction<'_, Sqlite>,
    embedding: &[f32],
) -> KnowledgeResult<()> {
    sqlx::query("INSERT OR IGNORE INTO meta (key, value) VALUES ('embedding_dim', ?)")
        .bind(embedding.len().to_string())
        .execute(&mut **tx)
        .await?;

    let (value,): (String,) =
        sqlx::query_as("SELECT value FROM meta WHERE key = 'embedding_dim' LIMIT 1")
            .fetch_one(&mut **tx)
            .await?;
    check_dimension(value.parse::<usize>().ok(), embedding)
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(
        &self,
        document: NewDocument,
        embedding: Option<Vec<f32>>,
    ) -> KnowledgeResult<String> {
        let mut tx = self.pool.begin().await?;
        let embedding_json = match &embedding {
            Some(vector) => {
                pin_dimension(&mut tx, vector).await?;
                Some(serde_json::to_string(vector)?)
            }
            None => None,
        };

        let id = new_document_id();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO documents (id, title, content, source, metadata_json, embedding_json, embedding_dim, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&document.title)
        .bind(&document.content)
        .bind(&document.source)
        .bind(serde_json::to_string(&document.metadata)?)
        .bind(embedding_json)
        .bind(embedding.as_ref().map(|v| v.len() as i64))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn get(&self, id: &str, include_embedding: bool) -> KnowledgeResult<KnowledgeDocument> {
        let row: Option<DocumentRow> = sqlx::query_as(SELECT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| KnowledgeError::NotFound(id.to_string()))?
            .into_document(include_embedding)
    }

    async fn list_all(&self, include_embedding: bool) -> KnowledgeResult<Vec<KnowledgeDocument>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| row.into_document(include_embedding))
            .collect()
    }

    async fn update(
        &self,
        id: &str,
        update: DocumentUpdate,
        embedding: Vec<f32>,
    ) -> KnowledgeResult<()> {
        let mut tx = self.pool.begin().await?;
        pin_dimension(&mut tx, &embedding).await?;

        let metadata_json = update
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            "UPDATE documents
             SET title = ?, content = ?, source = ?,
                 metadata_json = COALESCE(?, metadata_json),
                 embedding_json = ?, embedding_dim = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&update.title)
        .bind(&update.content)
        .bind(&update.source)
        .bind(metadata_json)
        .bind(serde_json::to_string(&embedding)?)
        .bind(embedding.len() as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back a dimension pinned above.
            return Err(KnowledgeError::NotFound(id.to_string()));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> KnowledgeResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(KnowledgeError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn embedding_dim(&self) -> KnowledgeResult<Option<usize>> {
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT value FROM meta WHERE key = 'embedding_dim' LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(existing.and_then(|(value,)| value.parse::<usize>().ok()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let store = SqliteDocumentStore::open_in_memory().await.unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("file_type".to_string(), json!("txt"));

        let id = store
            .insert(
                NewDocument::new("Cats", "Cats purr.")
                    .with_source("notes.txt")
                    .with_metadata(metadata.clone()),
                Some(vec![0.5, 0.5]),
            )
            .await
            .unwrap();
        assert!(id.starts_with("kn_"));

        let doc = store.get(&id, true).await.unwrap();
        assert_eq!(doc.title, "Cats");
        assert_eq!(doc.source.as_deref(), Some("notes.txt"));
        assert_eq!(doc.metadata, metadata);
        assert_eq!(doc.embedding, Some(vec![0.5, 0.5]));
        assert!(store.get(&id, false).await.unwrap().embedding.is_none());
    }

    #[tokio::test]
    async fn test_list_all_preserves_insertion_order() {
        let store = SqliteDocumentStore::open_in_memory().await.unwrap();
        let mut ids = Vec::new();
        for title in ["first", "second", "third"] {
            ids.push(
                store
                    .insert(NewDocument::new(title, "body"), None)
                    .await
                    .unwrap(),
            );
        }
        let listed: Vec<String> = store
            .list_all(false)
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.id)
            .collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn test_update_keeps_metadata_when_omitted() {
        let store = SqliteDocumentStore::open_in_memory().await.unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("filename".to_string(), json!("pets.json"));
        let id = store
            .insert(
                NewDocument::new("Cats", "Cats purr.").with_metadata(metadata.clone()),
                Some(vec![1.0, 0.0]),
            )
            .await
            .unwrap();

        store
            .update(&id, DocumentUpdate::new("Cats", "Cats nap."), vec![0.0, 1.0])
            .await
            .unwrap();

        let doc = store.get(&id, true).await.unwrap();
        assert_eq!(doc.content, "Cats nap.");
        assert_eq!(doc.metadata, metadata);
        assert_eq!(doc.embedding, Some(vec![0.0, 1.0]));
    }

    #[tokio::test]
    async fn test_dimension_pinning() {
        let store = SqliteDocumentStore::open_in_memory().await.unwrap();
        store
            .insert(NewDocument::new("a", "a"), Some(vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        assert_eq!(store.embedding_dim().await.unwrap(), Some(3));

        let err = store
            .insert(NewDocument::new("b", "b"), Some(vec![1.0]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KnowledgeError::DimensionMismatch {
                expected: 3,
                actual: 1
            }
        ));
        assert_eq!(store.list_all(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() {
        let store = SqliteDocumentStore::open_in_memory().await.unwrap();
        assert!(matches!(
            store.get("kn_missing", false).await,
            Err(KnowledgeError::NotFound(_))
        ));
        assert!(matches!(
            store
                .update("kn_missing", DocumentUpdate::new("t", "c"), vec![1.0])
                .await,
            Err(KnowledgeError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("kn_missing").await,
            Err(KnowledgeError::NotFound(_))
        ));
        assert_eq!(store.embedding_dim().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reopen_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("knowledge.sqlite3");

        let id = {
            let store = SqliteDocumentStore::open(&path).await.unwrap();
            store
                .insert(NewDocument::new("Cats", "Cats purr."), Some(vec![1.0]))
                .await
                .unwrap()
        };

        let store = SqliteDocumentStore::open(&path).await.unwrap();
        assert_eq!(store.get(&id, false).await.unwrap().title, "Cats");
        assert_eq!(store.embedding_dim().await.unwrap(), Some(1));
    }
}
