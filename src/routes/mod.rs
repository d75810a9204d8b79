use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::AppError;

pub mod health;
pub mod jobs;
pub mod metrics;
pub mod process;
pub mod upload;

/// Room for multipart boundaries and part headers on top of the image itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Job API routes with their body limits. Transport layers (tracing,
/// compression, CORS) and `/metrics` are added by the binary.
pub fn api_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/upload", post(upload::upload_image))
        .route("/process/{id}", post(process::process_image))
        .route("/status/{id}", get(jobs::get_job_status))
        .route("/download/{id}", get(jobs::download_image))
        .route("/original/{id}", get(jobs::original_image))
        .route("/preview/{id}", get(jobs::preview_image))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
}

/// Job ids are UUIDs; anything else cannot name a job.
pub(crate) fn parse_job_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Job not found".to_string()))
}
