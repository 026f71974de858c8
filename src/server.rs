//! HTTP API server.
//!
//! Serves the browser UI and the JSON API it talks to.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/api/documents` | List uploaded documents |
//! | `POST`   | `/api/upload` | Upload a PDF (multipart field `file`) |
//! | `DELETE` | `/api/documents/{id}` | Delete a document and its chunks |
//! | `GET`    | `/api/summary/{id}` | Cached or freshly generated summary |
//! | `POST`   | `/api/query` | Answer `{question, doc_id?}` from the documents |
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | anything else | Static UI files from `[server].static_dir` |
//!
//! # Error Contract
//!
//! Every failure is a flat JSON object the UI can show directly:
//!
//! ```json
//! { "error": "Document not found" }
//! ```
//!
//! Status codes: 400 invalid request, 404 unknown document, 413 upload over
//! `max_upload_bytes`, 500 extraction, model, or storage failure.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the UI can also be
//! hosted separately from the API.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::answer::{self, Answer, Summary};
use crate::config::Config;
use crate::db;
use crate::documents::{self, DeleteOutcome};
use crate::error::NavigatorError;
use crate::ingest::{self, UploadOutcome};
use crate::llm::{self, Generator};
use crate::migrate;
use crate::models::DocumentRecord;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (wrapped in `Arc` for cheap cloning across handlers).
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    /// Backend used for answers and summaries.
    pub generator: Arc<dyn Generator>,
}

impl AppState {
    pub fn new(config: Config, pool: SqlitePool, generator: Arc<dyn Generator>) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            generator,
        }
    }
}

/// Starts the HTTP server.
///
/// Connects to the database (running migrations), builds the configured
/// generator, and serves until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    let generator = llm::create_generator(&config.llm)?;

    let bind_addr = config.server.bind.clone();
    tracing::info!(
        model = generator.model_name(),
        static_dir = %config.server.static_dir.display(),
        "starting server"
    );

    let app = build_router(AppState::new(config.clone(), pool.clone(), generator));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Builds the router with all API routes, static file fallback, CORS, and
/// request tracing.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(&state.config.server.static_dir);
    let upload_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/api/documents", get(handle_list_documents))
        .route("/api/documents/{id}", delete(handle_delete_document))
        .route(
            "/api/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/summary/{id}", get(handle_summary))
        .route("/api/query", post(handle_query))
        .route("/health", get(handle_health))
        .fallback_service(static_files)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<NavigatorError> for AppError {
    fn from(err: NavigatorError) -> Self {
        let status = match &err {
            NavigatorError::BadRequest(_) => StatusCode::BAD_REQUEST,
            NavigatorError::NotFound(_) => StatusCode::NOT_FOUND,
            NavigatorError::Extraction(_)
            | NavigatorError::Llm(_)
            | NavigatorError::Storage(_)
            | NavigatorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        AppError::new(status, err.to_string())
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /api/documents ============

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentRecord>>, AppError> {
    Ok(Json(documents::list_documents(&state.pool).await?))
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    Ok(Json(
        documents::delete_document(&state.pool, &state.config, &id).await?,
    ))
}

// ============ POST /api/upload ============

/// Handler for `POST /api/upload`.
///
/// Reads the multipart `file` field (other fields are ignored) and runs it
/// through the upload pipeline.
async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadOutcome>, AppError> {
    let mut multipart = multipart.map_err(|_| AppError::bad_request("No file provided"))?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| AppError::bad_request("No file provided"))?;
    Ok(Json(
        ingest::ingest_upload(&state.pool, &state.config, &filename, bytes).await?,
    ))
}

/// The body limit can trip while reading headers or field data; both read
/// as "File too large".
fn multipart_error(e: MultipartError) -> AppError {
    let status = e.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(status, "File too large")
    } else {
        AppError::new(status, format!("Multipart error: {}", e.body_text()))
    }
}

// ============ GET /api/summary/{id} ============

async fn handle_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Summary>, AppError> {
    Ok(Json(
        answer::summarize(&state.pool, &state.config, state.generator.as_ref(), &id).await?,
    ))
}

// ============ POST /api/query ============

/// JSON request body for `POST /api/query`.
#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    question: Option<String>,
    /// Restricts retrieval to one document; empty means all documents.
    #[serde(default)]
    doc_id: Option<String>,
}

async fn handle_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(request) = body.map_err(|_| AppError::bad_request("No question provided"))?;

    let question = request
        .question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("No question provided"))?;
    let doc_id = request.doc_id.filter(|d| !d.is_empty());

    Ok(Json(
        answer::ask(
            &state.pool,
            &state.config,
            state.generator.as_ref(),
            &question,
            doc_id.as_deref(),
        )
        .await?,
    ))
}
