use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::api::UploadResponse;
use crate::services::{pipeline, processing};

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

struct Upload {
    filename: String,
    content_type: String,
    data: Vec<u8>,
}

/// POST /upload — Register an image as a new `pending` job.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let limit = state.max_upload_bytes;
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        // Reject on the declared type before reading the body.
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::UnsupportedMediaType(content_type));
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        if data.len() > limit {
            return Err(AppError::PayloadTooLarge { limit });
        }

        // The stored type comes from the bytes, never from the client.
        let content_type = match processing::sniff_content_type(&data) {
            Some(sniffed) => sniffed.to_string(),
            None if data.is_empty() => content_type,
            None => return Err(AppError::UnsupportedMediaType(content_type)),
        };

        upload = Some(Upload {
            filename,
            content_type,
            data: data.to_vec(),
        });
    }

    let upload = upload.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;
    if upload.data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
    }

    let size = upload.data.len();
    let job = pipeline::create_job(&state.store, upload.filename, upload.content_type, upload.data)
        .await?;

    Ok(Json(UploadResponse {
        id: job.id,
        filename: job.original_name,
        size,
    }))
}

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::BadRequest(format!("Malformed upload: {}", err.body_text()))
    }
}
