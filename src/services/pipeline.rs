use std::time::Instant;
use uuid::Uuid;

use crate::models::job::{JobOutput, ProcessingJob, TransitionError};
use crate::models::processing::Strategy;
use crate::services::processing::{self, ProcessingError};
use crate::services::store::{JobStore, StoreError};

/// Progress checkpoints recorded during a run.
pub const PROGRESS_STARTED: u8 = 10;
pub const PROGRESS_METADATA_READ: u8 = 30;
pub const PROGRESS_RESIZING: u8 = 50;
pub const PROGRESS_ENCODED: u8 = 80;

/// How a processing run ended. Both variants have been persisted.
#[derive(Debug)]
pub enum ProcessOutcome {
    Completed(ProcessingJob),
    Failed(ProcessingJob),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

/// Register an uploaded image as a new `pending` job.
pub async fn create_job(
    store: &JobStore,
    original_name: String,
    content_type: String,
    payload: Vec<u8>,
) -> Result<ProcessingJob, StoreError> {
    let job = ProcessingJob::new(original_name, content_type, payload);
    store.put(&job).await?;

    metrics::counter!("image_jobs_uploaded_total").increment(1);
    tracing::info!(
        job_id = %job.id,
        filename = %job.original_name,
        size = job.original_payload.len(),
        "Job created"
    );

    Ok(job)
}

/// Run `strategy` on a `pending` job, persisting every checkpoint.
///
/// Transform failures are recorded on the job and returned as
/// [`ProcessOutcome::Failed`]; only lookup, state and store problems are
/// errors. There is no lock on the job: two concurrent runs on the same id
/// race and the last write wins.
pub async fn process_job(
    store: &JobStore,
    id: Uuid,
    strategy: Strategy,
) -> Result<ProcessOutcome, PipelineError> {
    let mut job = store.get(id).await.ok_or(PipelineError::NotFound(id))?;

    job.begin_processing(PROGRESS_STARTED)?;
    store.put(&job).await?;

    tracing::info!(job_id = %id, strategy = %strategy.kind(), "Processing job");
    let start = Instant::now();

    match run_transform(store, &mut job, &strategy).await {
        Ok(output) => {
            tracing::info!(
                job_id = %id,
                original_size = output.stats.original_size,
                processed_size = output.stats.processed_size,
                compression_ratio = output.stats.compression_ratio,
                duration_ms = start.elapsed().as_millis() as u64,
                "Job completed"
            );
            job.complete(output)?;
            store.put(&job).await?;

            metrics::counter!("image_jobs_completed_total").increment(1);
            metrics::histogram!("image_processing_seconds").record(start.elapsed().as_secs_f64());
            Ok(ProcessOutcome::Completed(job))
        }
        Err(PipelineError::Processing(e)) => {
            tracing::error!(job_id = %id, error = %e, "Job processing failed");
            job.fail(e.to_string())?;
            store.put(&job).await?;

            metrics::counter!("image_jobs_failed_total").increment(1);
            Ok(ProcessOutcome::Failed(job))
        }
        Err(e) => Err(e),
    }
}

async fn run_transform(
    store: &JobStore,
    job: &mut ProcessingJob,
    strategy: &Strategy,
) -> Result<JobOutput, PipelineError> {
    let original = job.original_payload.clone();
    let source = run_blocking(move || processing::decode(&original)).await?;
    let original_dimensions = source.dimensions;

    tracing::debug!(
        job_id = %job.id,
        width = original_dimensions.width,
        height = original_dimensions.height,
        "Original image decoded"
    );

    job.advance(PROGRESS_METADATA_READ)?;
    store.put(job).await?;

    if matches!(strategy, Strategy::Pixel { .. }) {
        job.advance(PROGRESS_RESIZING)?;
        store.put(job).await?;
    }

    let to_apply = strategy.clone();
    let encoded = run_blocking(move || processing::transform(&source, &to_apply)).await?;

    job.advance(PROGRESS_ENCODED)?;
    store.put(job).await?;

    let new_dimensions = processing::probe_dimensions(&encoded)?;
    let stats = processing::compute_stats(
        job.original_payload.len(),
        encoded.len(),
        original_dimensions,
        new_dimensions,
        strategy.kind(),
    );

    Ok(JobOutput {
        payload: encoded,
        stats,
    })
}

async fn run_blocking<T, F>(f: F) -> Result<T, ProcessingError>
where
    F: FnOnce() -> Result<T, ProcessingError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ProcessingError::Worker(e.to_string()))?
}
