use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use kioku_core::ConversationTurn;
use kioku_knowledge::ingest::{record_from_text, records_from_json, records_from_rows};
use kioku_knowledge::{
    DocumentUpdate, KnowledgeDocument, KnowledgeError, NewDocument, ScoredResult, SearchQuery,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::chat::{ChatAnswer, ChatError};
use crate::state::AppState;

/// Chat request from HTTP API
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

/// Plain-text upload, already decoded by the caller
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextUploadRequest {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// CSV upload, parsed by the caller into header-keyed rows
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsvUploadRequest {
    pub rows: Vec<Map<String, Value>>,
    pub title_column: String,
    pub content_column: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// JSON array upload mapped onto documents field by field
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonUploadRequest {
    pub items: Value,
    pub title_field: String,
    pub content_field: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BulkCreatedResponse {
    pub ids: Vec<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by every handler, rendered as `{"error": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<KnowledgeError> for ApiError {
    fn from(err: KnowledgeError) -> Self {
        let status = match &err {
            KnowledgeError::NotFound(_) => StatusCode::NOT_FOUND,
            KnowledgeError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            KnowledgeError::Embedding(_) | KnowledgeError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Knowledge(err) => err.into(),
            err @ ChatError::Generation(_) => Self::new(StatusCode::BAD_GATEWAY, err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, "{}", self.message);
        } else {
            warn!(status = %self.status, "{}", self.message);
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run the HTTP server
pub async fn run(state: Arc<AppState>, bind_addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route(
            "/knowledge",
            get(list_knowledge_handler).post(create_knowledge_handler),
        )
        .route(
            "/knowledge/{id}",
            get(get_knowledge_handler)
                .put(update_knowledge_handler)
                .delete(delete_knowledge_handler),
        )
        .route("/knowledge/search", post(search_handler))
        .route("/knowledge/text", post(upload_text_handler))
        .route("/knowledge/csv", post(upload_csv_handler))
        .route("/knowledge/json", post(upload_json_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Chat handler - POST /chat
async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatAnswer> {
    let Json(request) = payload?;
    if request.message.trim().is_empty() {
        return Err(ApiError::unprocessable("message must not be empty"));
    }
    info!(history = request.history.len(), "Received chat request");

    let answer = state
        .answerer()
        .answer(&request.message, &request.history)
        .await?;
    Ok(Json(answer))
}

async fn list_knowledge_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<KnowledgeDocument>> {
    Ok(Json(state.engine().list().await?))
}

async fn create_knowledge_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewDocument>, JsonRejection>,
) -> ApiResult<CreatedResponse> {
    let Json(document) = payload?;
    let id = state.engine().create(document).await?;
    Ok(Json(CreatedResponse {
        id,
        message: "Knowledge added successfully".to_string(),
    }))
}

async fn get_knowledge_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<KnowledgeDocument> {
    Ok(Json(state.engine().get(&id).await?))
}

async fn update_knowledge_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<DocumentUpdate>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let Json(update) = payload?;
    state.engine().update(&id, update).await?;
    Ok(Json(MessageResponse {
        message: "Knowledge updated successfully".to_string(),
    }))
}

async fn delete_knowledge_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    state.engine().delete(&id).await?;
    Ok(Json(MessageResponse {
        message: "Knowledge deleted successfully".to_string(),
    }))
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchQuery>, JsonRejection>,
) -> ApiResult<Vec<ScoredResult>> {
    let Json(query) = payload?;
    Ok(Json(state.engine().search(query).await?))
}

async fn upload_text_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TextUploadRequest>, JsonRejection>,
) -> ApiResult<CreatedResponse> {
    let Json(upload) = payload?;
    let record = record_from_text(
        &upload.title,
        &upload.text,
        upload.source.as_deref(),
        upload.filename.as_deref(),
    );
    let id = state.engine().create(record).await?;
    Ok(Json(CreatedResponse {
        id,
        message: "Text file processed successfully".to_string(),
    }))
}

async fn upload_csv_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CsvUploadRequest>, JsonRejection>,
) -> ApiResult<BulkCreatedResponse> {
    let Json(upload) = payload?;
    let records = records_from_rows(
        &upload.rows,
        &upload.title_column,
        &upload.content_column,
        upload.filename.as_deref(),
    );
    let ids = state.engine().ingest(records).await?;
    let message = format!("Processed {} items from CSV", ids.len());
    Ok(Json(BulkCreatedResponse { ids, message }))
}

async fn upload_json_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JsonUploadRequest>, JsonRejection>,
) -> ApiResult<BulkCreatedResponse> {
    let Json(upload) = payload?;
    let records = records_from_json(
        &upload.items,
        &upload.title_field,
        &upload.content_field,
        upload.filename.as_deref(),
    );
    let ids = state.engine().ingest(records).await?;
    let message = format!("Processed {} items from JSON", ids.len());
    Ok(Json(BulkCreatedResponse { ids, message }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knowledge_error_status_mapping() {
        let cases = [
            (KnowledgeError::NotFound("kn_1".to_string()), StatusCode::NOT_FOUND),
            (
                KnowledgeError::InvalidInput("title must not be empty".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                KnowledgeError::Embedding("backend down".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                KnowledgeError::DimensionMismatch {
                    expected: 384,
                    actual: 768,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_generation_error_is_bad_gateway() {
        let err = ChatError::Generation(crate::providers::ProviderError::NoContent);
        assert_eq!(ApiError::from(err).status(), StatusCode::BAD_GATEWAY);

        let err = ChatError::Knowledge(KnowledgeError::NotFound("kn_1".to_string()));
        assert_eq!(ApiError::from(err).status(), StatusCode::NOT_FOUND);
    }
}
