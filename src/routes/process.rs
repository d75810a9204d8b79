use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::api::{ProcessFailedResponse, ProcessResponse};
use crate::models::processing::ProcessRequest;
use crate::routes::parse_job_id;
use crate::services::pipeline::{self, ProcessOutcome};

/// POST /process/{id} — Run a strategy on a pending job.
///
/// The request is validated before the job is touched, so a bad strategy
/// or option leaves the job as it was.
pub async fn process_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ProcessRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let strategy = request.into_strategy()?;
    let id = parse_job_id(&id)?;

    let response = match pipeline::process_job(&state.store, id, strategy).await? {
        ProcessOutcome::Completed(job) => {
            let stats = job
                .stats()
                .cloned()
                .ok_or_else(|| AppError::Internal(format!("completed job {id} has no stats")))?;
            Json(ProcessResponse {
                id,
                status: job.status(),
                output_location: format!("/download/{id}"),
                stats,
            })
            .into_response()
        }
        ProcessOutcome::Failed(job) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ProcessFailedResponse {
                id,
                status: job.status(),
                error: job.error().unwrap_or("Processing failed").to_string(),
            }),
        )
            .into_response(),
    };

    Ok(response)
}
