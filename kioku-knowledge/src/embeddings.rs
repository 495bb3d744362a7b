//! Text embedders.
//!
//! Everything that turns text into a vector implements [`Embedder`]. The
//! engine only ever holds an `Arc<dyn Embedder>`, so deployments and tests
//! choose the implementation at construction time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::KnowledgeSettings;
use crate::errors::{KnowledgeError, KnowledgeResult};
use kioku_core::EmbeddingProvider;

/// Dimension used by the hashing embedder when none is configured.
pub const DEFAULT_HASHING_DIM: usize = 384;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Vector length this embedder produces, when known up front.
    fn dimension(&self) -> Option<usize>;

    /// Embed a single text. Empty input yields a valid vector.
    async fn embed(&self, text: &str) -> KnowledgeResult<Vec<f32>>;

    /// Embed several texts, preserving input order.
    async fn embed_batch(&self, inputs: &[String]) -> KnowledgeResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            out.push(self.embed(input).await?);
        }
        Ok(out)
    }
}

/// Build the embedder selected in settings.
pub fn build_embedder(settings: &KnowledgeSettings) -> KnowledgeResult<Arc<dyn Embedder>> {
    match settings.embedding_provider {
        EmbeddingProvider::Ollama => Ok(Arc::new(EmbeddingClient::new(settings)?)),
        EmbeddingProvider::Hashing => Ok(Arc::new(
            HashingEmbedder::new(settings.embedding_dim.unwrap_or(DEFAULT_HASHING_DIM))
                .with_max_input_chars(settings.max_input_chars),
        )),
    }
}

fn check_input_budget(text: &str, max_chars: usize) -> KnowledgeResult<()> {
    let chars = text.chars().count();
    if chars > max_chars {
        return Err(KnowledgeError::Embedding(format!(
            "input has {chars} characters, limit is {max_chars}"
        )));
    }
    Ok(())
}

pub(crate) fn check_dimension(expected: Option<usize>, vector: &[f32]) -> KnowledgeResult<()> {
    match expected {
        Some(expected) if expected != vector.len() => Err(KnowledgeError::DimensionMismatch {
            expected,
            actual: vector.len(),
        }),
        _ => Ok(()),
    }
}

/// Client for an Ollama-compatible `/api/embed` endpoint.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    base_url: String,
    model: String,
    dimension: Option<usize>,
    max_input_chars: usize,
    client: reqwest::Client,
}

impl EmbeddingClient {
    pub fn new(settings: &KnowledgeSettings) -> KnowledgeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.embedding_timeout_seconds))
            .build()?;
        Ok(Self {
            base_url: settings.embedding_url.trim_end_matches('/').to_string(),
            model: settings.embedding_model.clone(),
            dimension: settings.embedding_dim,
            max_input_chars: settings.max_input_chars,
            client,
        })
    }

    async fn request(&self, inputs: &[String]) -> KnowledgeResult<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let body = EmbedRequest {
            model: &self.model,
            input: inputs,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(KnowledgeError::Embedding(format!(
                "embedding request failed: {status} {text}"
            )));
        }

        let payload: EmbedResponse = response.json().await?;

        let embeddings = match (payload.embeddings, payload.embedding) {
            (Some(embeddings), _) => embeddings,
            (None, Some(embedding)) => vec![embedding],
            (None, None) => {
                return Err(KnowledgeError::Embedding(
                    "embedding response missing vectors".to_string(),
                ));
            }
        };

        if embeddings.len() != inputs.len() {
            return Err(KnowledgeError::Embedding(format!(
                "embedding response returned {} vectors for {} inputs",
                embeddings.len(),
                inputs.len()
            )));
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    async fn embed(&self, text: &str) -> KnowledgeResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| KnowledgeError::Embedding("no vector returned".to_string()))
    }

    async fn embed_batch(&self, inputs: &[String]) -> KnowledgeResult<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        for input in inputs {
            check_input_budget(input, self.max_input_chars)?;
        }

        debug!(model = %self.model, count = inputs.len(), "requesting embeddings");
        let embeddings = self.request(inputs).await?;
        for vector in &embeddings {
            check_dimension(self.dimension, vector)?;
        }
        Ok(embeddings)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embeddings: Option<Vec<Vec<f32>>>,
    embedding: Option<Vec<f32>>,
}

/// Offline embedder based on signed feature hashing.
///
/// Each lowercased alphanumeric word and each character trigram of the
/// `#word#` form is hashed with SHA-256 into one of `dim` buckets with a
/// hash-derived sign. The result is L2-normalised, so texts sharing words or
/// word fragments score a positive cosine similarity. Empty text maps to the
/// zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    max_input_chars: usize,
}

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim: dim.max(1),
            max_input_chars: usize::MAX,
        }
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Synchronous embedding; prefer [`Embedder::embed`] from async code.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        hash_embed(text, self.dim)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dim)
    }

    async fn embed(&self, text: &str) -> KnowledgeResult<Vec<f32>> {
        check_input_budget(text, self.max_input_chars)?;
        let text = text.to_string();
        let dim = self.dim;
        let vector = tokio::task::spawn_blocking(move || hash_embed(&text, dim)).await?;
        Ok(vector)
    }
}

fn hash_embed(text: &str, dim: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dim];

    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let word = word.to_lowercase();
        add_feature(&mut vector, &format!("w:{word}"), WORD_WEIGHT);

        let padded: Vec<char> = format!("#{word}#").chars().collect();
        for gram in padded.windows(3) {
            let gram: String = gram.iter().collect();
            add_feature(&mut vector, &format!("g:{gram}"), TRIGRAM_WEIGHT);
        }
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

fn add_feature(vector: &mut [f32], feature: &str, weight: f32) {
    let digest = Sha256::digest(feature.as_bytes());
    let mut bucket_bytes = [0u8; 8];
    bucket_bytes.copy_from_slice(&digest[..8]);
    let bucket = (u64::from_le_bytes(bucket_bytes) % vector.len() as u64) as usize;
    let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
    vector[bucket] += sign * weight;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;

    #[tokio::test]
    async fn test_hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("The quick brown fox").await.unwrap();
        let b = embedder.embed("the QUICK brown fox!").await.unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hashing_embedder_empty_input() {
        let embedder = HashingEmbedder::new(16);
        let vector = embedder.embed("").await.unwrap();
        assert_eq!(vector.len(), 16);
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_hashing_embedder_is_normalised() {
        let embedder = HashingEmbedder::new(128);
        let vector = embedder.embed("knowledge base retrieval").await.unwrap();
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hashing_embedder_input_budget() {
        let embedder = HashingEmbedder::new(16).with_max_input_chars(4);
        let err = embedder.embed("too long").await.unwrap_err();
        assert!(matches!(err, KnowledgeError::Embedding(_)));
        assert!(embedder.embed("ok").await.is_ok());
    }

    #[test]
    fn test_word_fragments_overlap() {
        let embedder = HashingEmbedder::new(1024);
        let cats = embedder.embed_sync("cats");
        let cat = embedder.embed_sync("cat");
        let score = cosine_similarity(&cats, &cat).unwrap();
        assert!(score > 0.2, "score was {score}");
    }

    #[test]
    fn test_dimension_check() {
        assert!(check_dimension(None, &[1.0, 2.0]).is_ok());
        assert!(check_dimension(Some(2), &[1.0, 2.0]).is_ok());
        assert!(matches!(
            check_dimension(Some(3), &[1.0, 2.0]),
            Err(KnowledgeError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    mod client {
        use axum::{Json, Router, http::StatusCode, routing::post};
        use serde_json::{Value, json};

        use crate::KnowledgeSettings;
        use crate::embeddings::{Embedder, EmbeddingClient};
        use crate::errors::KnowledgeError;

        /// Serve a canned `/api/embed` reply on a loopback port.
        async fn mock_embed_server(status: StatusCode, reply: Value) -> String {
            let app = Router::new().route(
                "/api/embed",
                post(move |Json(_body): Json<Value>| {
                    let reply = reply.clone();
                    async move { (status, Json(reply)) }
                }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}")
        }

        fn client(base_url: &str, dim: Option<usize>) -> EmbeddingClient {
            let settings = KnowledgeSettings {
                embedding_url: base_url.to_string(),
                embedding_dim: dim,
                ..Default::default()
            };
            EmbeddingClient::new(&settings).unwrap()
        }

        #[tokio::test]
        async fn test_batch_keeps_input_order() {
            let base_url = mock_embed_server(
                StatusCode::OK,
                json!({"embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]}),
            )
            .await;
            let vectors = client(&base_url, Some(3))
                .embed_batch(&["first".to_string(), "second".to_string()])
                .await
                .unwrap();
            assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
        }

        #[tokio::test]
        async fn test_server_error_is_embedding_error() {
            let base_url = mock_embed_server(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "model not loaded"}),
            )
            .await;
            let err = client(&base_url, None).embed("hello").await.unwrap_err();
            match err {
                KnowledgeError::Embedding(message) => {
                    assert!(message.contains("500"), "message was {message}");
                    assert!(message.contains("model not loaded"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_vector_count_mismatch_is_embedding_error() {
            let base_url = mock_embed_server(StatusCode::OK, json!({"embeddings": []})).await;
            let err = client(&base_url, None).embed("hello").await.unwrap_err();
            assert!(matches!(err, KnowledgeError::Embedding(_)), "{err:?}");
        }

        #[tokio::test]
        async fn test_missing_vectors_is_embedding_error() {
            let base_url = mock_embed_server(StatusCode::OK, json!({"model": "all-minilm"})).await;
            let err = client(&base_url, None).embed("hello").await.unwrap_err();
            assert!(matches!(err, KnowledgeError::Embedding(_)), "{err:?}");
        }

        #[tokio::test]
        async fn test_wrong_length_vector_is_dimension_mismatch() {
            let base_url = mock_embed_server(StatusCode::OK, json!({"embeddings": [[0.5, 0.5]]})).await;
            let err = client(&base_url, Some(3)).embed("hello").await.unwrap_err();
            assert!(matches!(
                err,
                KnowledgeError::DimensionMismatch {
                    expected: 3,
                    actual: 2
                }
            ));
        }

        #[tokio::test]
        async fn test_single_embedding_field_is_accepted() {
            let base_url = mock_embed_server(StatusCode::OK, json!({"embedding": [0.1, 0.2]})).await;
            let vector = client(&base_url, Some(2)).embed("hello").await.unwrap();
            assert_eq!(vector, vec![0.1, 0.2]);
        }
    }

    #[tokio::test]
    async fn test_build_embedder_hashing() {
        let settings = KnowledgeSettings {
            embedding_provider: EmbeddingProvider::Hashing,
            embedding_dim: Some(32),
            ..Default::default()
        };
        let embedder = build_embedder(&settings).unwrap();
        assert_eq!(embedder.name(), "hashing");
        assert_eq!(embedder.dimension(), Some(32));
        assert_eq!(embedder.embed("hello").await.unwrap().len(), 32);
    }
}
