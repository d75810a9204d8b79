use serde::Serialize;
use uuid::Uuid;

use crate::models::job::{JobStats, JobStatus, ProcessingJob};

/// Response after uploading an image.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: Uuid,
    pub filename: String,
    pub size: usize,
}

/// Response for a completed processing run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub id: Uuid,
    pub status: JobStatus,
    pub output_location: String,
    pub stats: JobStats,
}

/// Response for a processing run that ended in `failed`.
#[derive(Debug, Serialize)]
pub struct ProcessFailedResponse {
    pub id: Uuid,
    pub status: JobStatus,
    pub error: String,
}

/// Response for querying job status.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<JobStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ProcessingJob> for JobStatusResponse {
    fn from(job: &ProcessingJob) -> Self {
        Self {
            id: job.id,
            status: job.status(),
            progress: job.progress(),
            stats: job.stats().cloned(),
            error: job.error().map(str::to_owned),
        }
    }
}
