// src/api.rs
//! Thin HTTP surface over the orchestrator.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::cache::CacheStats;
use crate::enrich::OP_ENRICH;
use crate::error::{FetchError, TriageError};
use crate::orchestrator::{Orchestrator, ResultEnvelope, SourceRequest, OP_FETCH};

/// Upload limit for bulk files.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/v1/comments", post(post_comment))
        .route("/api/v1/comments/csv", post(post_comments_file))
        .route("/api/v1/reviews", post(post_reviews))
        .route("/api/v1/cache/stats", get(cache_stats))
        .route("/api/v1/cache/{operation}", delete(clear_cache_operation))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct CommentReq {
    text: String,
    #[serde(default = "default_true")]
    enrich: bool,
}

#[derive(Deserialize)]
struct EnrichQuery {
    #[serde(default = "default_true")]
    enrich: bool,
}

#[derive(Deserialize)]
struct ReviewsReq {
    #[serde(flatten)]
    source: SourceRequest,
    #[serde(default = "default_true")]
    enrich: bool,
}

async fn post_comment(
    State(state): State<AppState>,
    Json(body): Json<CommentReq>,
) -> Result<Json<ResultEnvelope>, ApiError> {
    let env = state
        .orchestrator
        .process_single(&body.text, body.enrich)
        .await?;
    Ok(Json(env))
}

async fn post_comments_file(
    State(state): State<AppState>,
    Query(q): Query<EnrichQuery>,
    body: Bytes,
) -> Result<Json<ResultEnvelope>, ApiError> {
    let env = state
        .orchestrator
        .process_bulk_file(&body, q.enrich)
        .await?;
    Ok(Json(env))
}

async fn post_reviews(
    State(state): State<AppState>,
    Json(body): Json<ReviewsReq>,
) -> Result<Json<ResultEnvelope>, ApiError> {
    // Cancelled when the client goes away and axum drops this future.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let env = state
        .orchestrator
        .process_source(&body.source, body.enrich, &cancel)
        .await?;
    Ok(Json(env))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.orchestrator.cache().stats().await)
}

#[derive(Serialize)]
struct ClearResp {
    operation: String,
    removed: u64,
}

async fn clear_cache_operation(
    State(state): State<AppState>,
    Path(operation): Path<String>,
) -> Result<Json<ClearResp>, ApiError> {
    if operation != OP_FETCH && operation != OP_ENRICH {
        return Err(ApiError(TriageError::InvalidInput(format!(
            "unknown cache operation `{operation}`"
        ))));
    }
    let removed = state.orchestrator.cache().clear_operation(&operation).await;
    Ok(Json(ClearResp { operation, removed }))
}

/// `TriageError` as a JSON `{error, message}` response.
pub struct ApiError(pub TriageError);

impl From<TriageError> for ApiError {
    fn from(e: TriageError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    retryable: bool,
}

pub fn status_for(e: &TriageError) -> StatusCode {
    match e {
        TriageError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        TriageError::Fetch(FetchError::MalformedSourceLocator { .. }) => StatusCode::BAD_REQUEST,
        TriageError::Fetch(FetchError::SourceUnavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
        TriageError::Fetch(FetchError::Cancelled { .. }) => StatusCode::REQUEST_TIMEOUT,
        TriageError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "request failed");
        } else {
            tracing::info!(kind = self.0.kind(), error = %self.0, "request rejected");
        }
        let body = ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
            retryable: self.0.is_retryable(),
        };
        let mut resp = (status, Json(body)).into_response();
        if self.0.is_retryable() {
            resp.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("30"));
        }
        resp
    }
}
