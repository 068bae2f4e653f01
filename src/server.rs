//! JSON HTTP API for querying assistant profiles.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/profiles` | `[{name, model}]` for every stored profile |
//! | `POST` | `/query` | Ask a profile a question |
//! | `POST` | `/profiles/{name}/reset` | Clear a profile's chat history |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no profile named: BuddBot" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `context_not_ready` (409), `upstream_error` (502), `internal` (500).
//!
//! Loaded profiles are held in a [`ProfileCache`]; their chat history lives
//! only in memory and survives between requests until the server stops or
//! the history is reset.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use context_assistant_core::capability::{ChatCompleter, Embedder};
use context_assistant_core::error::Error;
use context_assistant_core::models::ProfileSummary;
use context_assistant_core::retrieval::{QueryMode, RetrievalOrchestrator};
use context_assistant_core::store::ContextStore;

use crate::cache::ProfileCache;
use crate::config::Config;
use crate::openai;
use crate::sqlite_store::SqliteContextStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    cache: Arc<ProfileCache>,
    orchestrator: Arc<RetrievalOrchestrator>,
}

impl AppState {
    pub fn new(cache: Arc<ProfileCache>, orchestrator: Arc<RetrievalOrchestrator>) -> Self {
        Self {
            cache,
            orchestrator,
        }
    }
}

/// Starts the HTTP server with the OpenAI collaborators from `[openai]`.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let (embedder, completer) = openai::collaborators(&config.openai)?;
    run_server_with_collaborators(config, embedder, completer).await
}

/// Like [`run_server`], but with caller-supplied collaborators.
pub async fn run_server_with_collaborators(
    config: &Config,
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn ChatCompleter>,
) -> anyhow::Result<()> {
    let store: Arc<dyn ContextStore> = Arc::new(SqliteContextStore::open(config).await?);
    let orchestrator =
        RetrievalOrchestrator::new(embedder, completer).with_top_k(config.retrieval.top_k);
    let state = AppState::new(
        Arc::new(ProfileCache::new(store)),
        Arc::new(orchestrator),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "server listening");
    println!("Listening on http://{}", config.server.bind);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/profiles", get(handle_list_profiles))
        .route("/query", post(handle_query))
        .route("/profiles/{name}/reset", post(handle_reset))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::ContextNotReady(_) => AppError {
                status: StatusCode::CONFLICT,
                code: "context_not_ready",
                message,
            },
            Error::Collaborator(_) => {
                warn!(error = %message, "collaborator failure");
                AppError {
                    status: StatusCode::BAD_GATEWAY,
                    code: "upstream_error",
                    message,
                }
            }
            _ => {
                error!(error = %message, "request failed");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message,
                }
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

// ============ GET /profiles ============

async fn handle_list_profiles(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProfileSummary>>, AppError> {
    let summaries = state.cache.store().get_all_profile_summaries().await?;
    Ok(Json(summaries))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    profile: String,
    message: String,
    #[serde(default = "default_augment")]
    augment: bool,
}

fn default_augment() -> bool {
    true
}

#[derive(Serialize)]
struct QueryResponse {
    profile: String,
    message: String,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let shared = state
        .cache
        .get_or_load(&req.profile)
        .await?
        .ok_or_else(|| not_found(format!("no profile named: {}", req.profile)))?;

    // Held for the whole query so one profile's transcript sees one query at a time.
    let mut profile = shared.lock().await;
    let reply = state
        .orchestrator
        .query(
            &mut profile,
            &req.message,
            QueryMode::from_augment_flag(req.augment),
        )
        .await?;

    Ok(Json(QueryResponse {
        profile: req.profile,
        message: reply,
    }))
}

// ============ POST /profiles/{name}/reset ============

#[derive(Serialize)]
struct ResetResponse {
    profile: String,
    history_len: usize,
}

async fn handle_reset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ResetResponse>, AppError> {
    let shared = state
        .cache
        .get_or_load(&name)
        .await?
        .ok_or_else(|| not_found(format!("no profile named: {}", name)))?;

    let mut profile = shared.lock().await;
    profile.clear_history();
    info!(profile = %name, "history reset");

    Ok(Json(ResetResponse {
        profile: name,
        history_len: profile.history().len(),
    }))
}
