//! Pipeline and store behaviour observed through injected backends.

mod fixtures;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use fixtures::*;
use image_compressor::models::job::{JobStatus, ProcessingJob};
use image_compressor::models::processing::{ResizeMode, Strategy};
use image_compressor::services::pipeline::{self, PipelineError, ProcessOutcome};
use image_compressor::services::store::{JobStore, KvBackend, MemoryStore, StoreError};

/// Memory backend that records every write, like a client polling after each one.
#[derive(Default)]
struct RecordingBackend {
    inner: MemoryStore,
    writes: Mutex<Vec<(JobStatus, u8)>>,
}

impl RecordingBackend {
    fn writes(&self) -> Vec<(JobStatus, u8)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl KvBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProcessingJob>, StoreError> {
        self.inner.get(id).await
    }

    async fn put(&self, job: &ProcessingJob, ttl: Duration) -> Result<(), StoreError> {
        self.writes.lock().unwrap().push((job.status(), job.progress()));
        self.inner.put(job, ttl).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Backend that is never reachable.
struct DownBackend;

#[async_trait]
impl KvBackend for DownBackend {
    fn name(&self) -> &'static str {
        "down"
    }

    async fn get(&self, _id: Uuid) -> Result<Option<ProcessingJob>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn put(&self, _job: &ProcessingJob, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

async fn new_job(store: &JobStore, data: Vec<u8>) -> ProcessingJob {
    pipeline::create_job(store, "fixture.png".to_string(), "image/png".to_string(), data)
        .await
        .unwrap()
}

fn assert_non_decreasing(writes: &[(JobStatus, u8)]) {
    for pair in writes.windows(2) {
        assert!(pair[0].1 <= pair[1].1, "progress went backwards: {:?}", writes);
    }
}

#[tokio::test]
async fn test_pixel_run_checkpoints_are_monotonic() {
    let backend = Arc::new(RecordingBackend::default());
    let store = JobStore::with_backend(backend.clone(), Duration::from_secs(60));
    let job = new_job(&store, png_image(200, 100)).await;

    let strategy = Strategy::Pixel {
        resize: ResizeMode::Percentage(50),
        quality: 85,
    };
    let outcome = pipeline::process_job(&store, job.id, strategy).await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::Completed(_)));

    let writes = backend.writes();
    assert_non_decreasing(&writes);
    assert_eq!(
        writes,
        vec![
            (JobStatus::Pending, 0),
            (JobStatus::Processing, 10),
            (JobStatus::Processing, 30),
            (JobStatus::Processing, 50),
            (JobStatus::Processing, 80),
            (JobStatus::Completed, 100),
        ]
    );
}

#[tokio::test]
async fn test_quality_run_skips_resize_checkpoint() {
    let backend = Arc::new(RecordingBackend::default());
    let store = JobStore::with_backend(backend.clone(), Duration::from_secs(60));
    let job = new_job(&store, png_image(64, 64)).await;

    pipeline::process_job(&store, job.id, Strategy::Quality { quality: 70 })
        .await
        .unwrap();

    let progress: Vec<u8> = backend.writes().iter().map(|(_, p)| *p).collect();
    assert_eq!(progress, vec![0, 10, 30, 80, 100]);
}

#[tokio::test]
async fn test_failed_run_records_error_without_output() {
    let backend = Arc::new(RecordingBackend::default());
    let store = JobStore::with_backend(backend.clone(), Duration::from_secs(60));
    let job = new_job(&store, b"garbage".to_vec()).await;

    let outcome = pipeline::process_job(&store, job.id, Strategy::Quality { quality: 85 })
        .await
        .unwrap();
    let failed = match outcome {
        ProcessOutcome::Failed(job) => job,
        other => panic!("expected failure, got {:?}", other),
    };
    assert_eq!(failed.status(), JobStatus::Failed);
    assert!(failed.error().unwrap().contains("decode"));
    assert!(failed.output_payload().is_none());

    let stored = store.get(job.id).await.unwrap();
    assert_eq!(stored.status(), JobStatus::Failed);
    assert!(stored.stats().is_none());
    assert_eq!(backend.writes().last(), Some(&(JobStatus::Failed, 10)));
}

#[tokio::test]
async fn test_down_backend_falls_back_transparently() {
    let store = JobStore::with_backend(Arc::new(DownBackend), Duration::from_secs(60));
    let job = new_job(&store, png_image(32, 32)).await;

    let fetched = store.get(job.id).await.expect("job served from fallback");
    assert_eq!(fetched.status(), JobStatus::Pending);

    let outcome = pipeline::process_job(&store, job.id, Strategy::Quality { quality: 50 })
        .await
        .unwrap();
    assert!(matches!(outcome, ProcessOutcome::Completed(_)));
    assert_eq!(store.get(job.id).await.unwrap().progress(), 100);
    assert!(store.health_check().await.is_err());
}

#[tokio::test]
async fn test_processing_unknown_job_is_not_found() {
    let store = JobStore::in_memory();
    let id = Uuid::new_v4();
    let err = pipeline::process_job(&store, id, Strategy::Quality { quality: 85 })
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NotFound(missing) if missing == id));
}
