//! Shared helpers for integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use kioku_core::ChatMessage;
use kioku_gateway::chat::{AnswerGenerator, AnswerSettings};
use kioku_gateway::providers::{Provider, ProviderError, ProviderResponse};
use kioku_gateway::server::create_router;
use kioku_gateway::state::AppState;
use kioku_knowledge::{
    DocumentStore, HashingEmbedder, KnowledgeEngine, KnowledgeSettings, MemoryDocumentStore,
};

/// Provider double that answers with a fixed text and records prompts.
pub struct CannedProvider {
    reply: Result<String, u16>,
    pub prompts: Mutex<Vec<(Vec<ChatMessage>, String)>>,
}

#[allow(dead_code)]
impl CannedProvider {
    pub fn answering(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always fails with an API error carrying `status`.
    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl Provider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    fn model(&self) -> &str {
        "canned-model"
    }

    async fn send_conversation(
        &self,
        _system: Option<&str>,
        history: Vec<ChatMessage>,
        new_message: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        self.prompts
            .lock()
            .unwrap()
            .push((history, new_message.to_string()));
        match &self.reply {
            Ok(text) => Ok(ProviderResponse {
                id: "canned-1".to_string(),
                model: "canned-model".to_string(),
                text: text.clone(),
                usage: None,
                stop_reason: Some("STOP".to_string()),
            }),
            Err(status) => Err(ProviderError::ApiError {
                status: *status,
                message: "upstream failure".to_string(),
            }),
        }
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub engine: Arc<KnowledgeEngine>,
    pub provider: Arc<CannedProvider>,
}

impl TestApp {
    pub fn new(provider: CannedProvider) -> Self {
        Self::with_store(provider, Arc::new(MemoryDocumentStore::new()))
    }

    pub fn with_store(provider: CannedProvider, store: Arc<dyn DocumentStore>) -> Self {
        let engine = Arc::new(KnowledgeEngine::with_components(
            KnowledgeSettings::default(),
            Arc::new(HashingEmbedder::new(1024)),
            store,
        ));
        let provider = Arc::new(provider);
        let answer_settings = AnswerSettings {
            retry_backoff: Duration::from_millis(1),
            ..AnswerSettings::default()
        };
        let answerer = AnswerGenerator::new(engine.clone(), provider.clone(), answer_settings);
        let state = Arc::new(AppState::new(engine.clone(), answerer));

        Self {
            router: create_router(state),
            engine,
            provider,
        }
    }

    /// Send one request through the router and decode the JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }
}
