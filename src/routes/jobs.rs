use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::api::JobStatusResponse;
use crate::models::job::ProcessingJob;
use crate::routes::parse_job_id;
use crate::services::processing::OUTPUT_CONTENT_TYPE;

/// Browsers must render stored bytes as the declared type only.
const NOSNIFF: &str = "nosniff";

async fn load_job(state: &AppState, raw_id: &str) -> AppResult<ProcessingJob> {
    let id = parse_job_id(raw_id)?;
    state
        .store
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))
}

fn output_of(job: &ProcessingJob) -> AppResult<Vec<u8>> {
    job.output_payload()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| AppError::NotFound("Processed image not found".to_string()))
}

/// GET /status/{id} — Current status, progress, stats and error of a job.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<JobStatusResponse>> {
    let job = load_job(&state, &id).await?;
    Ok(Json(JobStatusResponse::from(&job)))
}

/// GET /download/{id} — Processed image as an attachment.
pub async fn download_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let job = load_job(&state, &id).await?;
    let bytes = output_of(&job)?;

    tracing::info!(job_id = %job.id, size = bytes.len(), "Serving processed image");

    Ok((
        [
            (header::CONTENT_TYPE, OUTPUT_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"processed_{}.jpg\"", job.id),
            ),
            (header::CACHE_CONTROL, "no-cache".to_string()),
            (header::X_CONTENT_TYPE_OPTIONS, NOSNIFF.to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// GET /original/{id} — Uploaded image, inline.
pub async fn original_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let job = load_job(&state, &id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, job.content_type),
            (header::X_CONTENT_TYPE_OPTIONS, NOSNIFF.to_string()),
        ],
        job.original_payload,
    )
        .into_response())
}

/// GET /preview/{id} — Processed image, inline.
pub async fn preview_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let job = load_job(&state, &id).await?;
    let bytes = output_of(&job)?;
    Ok((
        [
            (header::CONTENT_TYPE, OUTPUT_CONTENT_TYPE),
            (header::X_CONTENT_TYPE_OPTIONS, NOSNIFF),
        ],
        bytes,
    )
        .into_response())
}
