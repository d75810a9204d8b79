use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Status of an image processing job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// `completed` and `failed` have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Pixel dimensions, serialized as a `[width, height]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl From<[u32; 2]> for Dimensions {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

impl From<Dimensions> for [u32; 2] {
    fn from(d: Dimensions) -> Self {
        [d.width, d.height]
    }
}

/// Before/after comparison computed from the produced output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub original_size: u64,
    pub processed_size: u64,
    /// Percentage of bytes saved; negative when the output grew.
    pub compression_ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_dimensions: Option<Dimensions>,
    /// Only set by the pixel strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_reduction: Option<f64>,
}

/// Result bytes and their stats. Kept in one value so a job has both or neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutput {
    #[serde(with = "base64_payload")]
    pub payload: Vec<u8>,
    pub stats: JobStats,
}

/// An uploaded image and the lifecycle of its processing run.
///
/// Mutable state is only reachable through the transition methods, which
/// enforce `pending -> processing -> {completed | failed}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingJob {
    pub id: Uuid,
    status: JobStatus,
    #[serde(with = "base64_payload")]
    pub original_payload: Vec<u8>,
    pub original_name: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<JobOutput>,
    progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    pub created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
#[error("job {id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub id: Uuid,
    pub from: JobStatus,
    pub to: JobStatus,
}

impl ProcessingJob {
    /// A fresh `pending` job with a newly minted id.
    pub fn new(original_name: String, content_type: String, original_payload: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            original_payload,
            original_name,
            content_type,
            output: None,
            progress: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn stats(&self) -> Option<&JobStats> {
        self.output.as_ref().map(|o| &o.stats)
    }

    pub fn output_payload(&self) -> Option<&[u8]> {
        self.output.as_ref().map(|o| o.payload.as_slice())
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Start a processing run. Only `pending` jobs may start.
    pub fn begin_processing(&mut self, initial_progress: u8) -> Result<(), TransitionError> {
        self.ensure(self.status == JobStatus::Pending, JobStatus::Processing)?;
        self.status = JobStatus::Processing;
        self.progress = initial_progress.min(100);
        self.touch();
        Ok(())
    }

    /// Record a progress checkpoint. Lower values than the current one are ignored.
    pub fn advance(&mut self, progress: u8) -> Result<(), TransitionError> {
        self.ensure(self.status == JobStatus::Processing, JobStatus::Processing)?;
        self.progress = self.progress.max(progress.min(100));
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self, output: JobOutput) -> Result<(), TransitionError> {
        self.ensure(self.status == JobStatus::Processing, JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.output = Some(output);
        self.touch();
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure(self.status == JobStatus::Processing, JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
        self.output = None;
        self.touch();
        Ok(())
    }

    fn ensure(&self, allowed: bool, to: JobStatus) -> Result<(), TransitionError> {
        if allowed {
            Ok(())
        } else {
            Err(TransitionError {
                id: self.id,
                from: self.status,
                to,
            })
        }
    }

    fn touch(&mut self) {
        // Keep updated_at strictly increasing so store reconciliation can order writes.
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + chrono::Duration::microseconds(1)
        };
    }
}

/// Raw bytes travel through the store as base64 strings.
mod base64_payload {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
