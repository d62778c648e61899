//! REST API handlers
//!
//! Routes:
//! - `POST /apuntes/generate/start` start a background generation job
//! - `GET /apuntes/generate/{job_id}` job snapshot
//! - `POST /apuntes/generate/{job_id}/cancel` cancel a job
//! - `GET /apuntes/generate` all jobs, newest first
//! - `POST /apuntes/generate` generate synchronously and return the course
//! - `GET /api/health` liveness and job counts

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApuntesErrorTrait, Error, ErrorCategory};
use crate::jobs::JobStats;
use crate::models::{GenerationJob, JobStatus};
use crate::storage::StoredCourse;

use super::AppState;

// ============================================================================
// API Types
// ============================================================================

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub jobs: JobStats,
}

/// JSON body extractor whose rejections use the API error body
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

/// Handler error mapped to an HTTP status by category
#[derive(Debug)]
pub struct ApiError(Error);

impl<E> From<E> for ApiError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.category() {
            ErrorCategory::Input => StatusCode::BAD_REQUEST,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Cancelled => StatusCode::REQUEST_TIMEOUT,
            ErrorCategory::Provider | ErrorCategory::Validation => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        (status, Json(ErrorResponse::new(self.0.to_string()))).into_response()
    }
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route(
            "/apuntes/generate",
            get(list_generations).post(generate_now),
        )
        .route("/apuntes/generate/start", post(start_generation))
        .route("/apuntes/generate/{job_id}", get(get_generation))
        .route("/apuntes/generate/{job_id}/cancel", post(cancel_generation))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        jobs: state.context.registry.stats().await,
    })
}

async fn start_generation(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let job_id = state.context.registry.start_job(&request.topic).await?;
    Ok(Json(StartResponse { job_id }))
}

async fn get_generation(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<GenerationJob>, ApiError> {
    Ok(Json(state.context.registry.get_status(&job_id).await?))
}

async fn cancel_generation(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let status = state.context.registry.cancel(&job_id).await?;
    Ok(Json(CancelResponse { status }))
}

async fn list_generations(State(state): State<AppState>) -> Json<Vec<GenerationJob>> {
    Json(state.context.registry.list().await)
}

async fn generate_now(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> Result<Json<StoredCourse>, ApiError> {
    Ok(Json(state.context.generate_course(&request.topic).await?))
}
