//! JSON HTTP server over the question-answering pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Answer a question with cited sources |
//! | `GET`  | `/search?q=` | Locate and rank documents, no synthesis |
//! | `GET`  | `/read?id=` | Extract bounded text from one document |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "missing_question", "message": "Question must not be empty" } }
//! ```
//!
//! Error codes: `missing_question` (400), `config_missing` (500),
//! `synthesis_failed` (500), `read_failed` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser dashboards
//! can call the API directly.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::extract;
use crate::pipeline::{self, Answer, PipelineError, SearchHit};
use crate::store::DocumentStore;
use crate::synthesize::{CompletionClient, SynthesisError};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn DocumentStore>,
    completion: Arc<dyn CompletionClient>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(
    config: &Config,
    store: Arc<dyn DocumentStore>,
    completion: Arc<dyn CompletionClient>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        completion,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/chat", post(handle_chat))
        .route("/search", get(handle_search))
        .route("/read", get(handle_read))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!(addr = %bind_addr, "server listening");
    println!("Server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"missing_question"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn missing_question(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "missing_question".to_string(),
        message: message.into(),
    }
}

fn config_missing(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "config_missing".to_string(),
        message: message.into(),
    }
}

fn synthesis_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "synthesis_failed".to_string(),
        message: message.into(),
    }
}

fn read_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "read_failed".to_string(),
        message: message.into(),
    }
}

/// Map a pipeline failure onto the error contract. Configuration problems
/// surface as `config_missing` so operators can tell them apart from
/// provider outages.
fn classify_pipeline_error(err: PipelineError) -> AppError {
    match err {
        PipelineError::InvalidInput(msg) => missing_question(msg),
        PipelineError::Synthesis(e) => {
            if matches!(e, SynthesisError::MissingApiKey) {
                config_missing(e.to_string())
            } else {
                synthesis_failed(e.to_string())
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /chat ============

/// Chat body. Either a bare `question` or a chat transcript; with a
/// transcript, the last user turn is the question.
#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: String,
}

impl ChatRequest {
    fn question(&self) -> &str {
        if !self.question.trim().is_empty() {
            return &self.question;
        }
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Handler for `POST /chat`. Runs the full pipeline: normalize, locate,
/// rank, extract, cite, synthesize.
async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Answer>, AppError> {
    let answer = pipeline::answer_question(
        Arc::clone(&state.store),
        state.completion.as_ref(),
        &state.config,
        request.question(),
    )
    .await
    .map_err(classify_pipeline_error)?;
    Ok(Json(answer))
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct SearchResponse {
    files: Vec<SearchHit>,
}

/// Handler for `GET /search`. Locates and ranks without extraction or
/// synthesis, exposing scores and provenance for diagnostics.
async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let files = pipeline::search_documents(state.store.as_ref(), &state.config, &params.q)
        .await
        .map_err(classify_pipeline_error)?;
    Ok(Json(SearchResponse { files }))
}

// ============ GET /read ============

#[derive(Deserialize)]
struct ReadParams {
    #[serde(default)]
    id: String,
}

#[derive(Serialize)]
struct ReadResponse {
    id: String,
    name: String,
    #[serde(rename = "contentType")]
    content_type: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

/// Handler for `GET /read`. Fetches one document's metadata and extracts
/// its text. Metadata failure is a hard error here (there is nothing to
/// degrade to); extraction failures still degrade to a note.
async fn handle_read(
    State(state): State<AppState>,
    Query(params): Query<ReadParams>,
) -> Result<Json<ReadResponse>, AppError> {
    if params.id.trim().is_empty() {
        return Err(missing_question("id must not be empty"));
    }
    let handle = state
        .store
        .get_metadata(&params.id)
        .await
        .map_err(|e| read_failed(e.to_string()))?;
    let extracted = extract::extract(state.store.as_ref(), &handle, &state.config.extract).await;
    Ok(Json(ReadResponse {
        id: handle.id,
        name: handle.name,
        content_type: handle.content_type,
        text: extracted.text,
        note: extracted.note,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_body_accepts_question_or_transcript() {
        let direct: ChatRequest = serde_json::from_str(r#"{"question":"sublease?"}"#).unwrap();
        assert_eq!(direct.question(), "sublease?");

        let transcript: ChatRequest = serde_json::from_str(
            r#"{"messages":[
                {"role":"user","content":"first question"},
                {"role":"assistant","content":"an answer"},
                {"role":"user","content":"follow-up question"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(transcript.question(), "follow-up question");

        let empty: ChatRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.question(), "");
    }

    #[test]
    fn explicit_question_wins_over_transcript() {
        let both: ChatRequest = serde_json::from_str(
            r#"{"question":"direct","messages":[{"role":"user","content":"from transcript"}]}"#,
        )
        .unwrap();
        assert_eq!(both.question(), "direct");
    }
}
