//! Helpers for driving a running server over HTTP

#![allow(dead_code)]

use reqwest::multipart;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Response from POST /upload
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub id: Uuid,
    pub filename: String,
    pub size: usize,
}

/// Response from GET /status/{id}
#[derive(Debug, Deserialize)]
pub struct JobStatusResponse {
    pub id: Uuid,
    pub status: String,
    pub progress: u8,
    pub stats: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Upload image bytes as the `image` multipart field
pub async fn upload_image(
    client: &reqwest::Client,
    base_url: &str,
    filename: &str,
    content_type: &str,
    bytes: Vec<u8>,
) -> Result<UploadResponse, Box<dyn std::error::Error>> {
    let form = multipart::Form::new().part(
        "image",
        multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)?,
    );

    let response = client
        .post(format!("{}/upload", base_url))
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Upload failed with status {}: {}", status, error_text).into());
    }

    Ok(response.json::<UploadResponse>().await?)
}

/// Trigger processing and return the status code with the JSON body
pub async fn process_image(
    client: &reqwest::Client,
    base_url: &str,
    id: Uuid,
    body: serde_json::Value,
) -> Result<(reqwest::StatusCode, serde_json::Value), Box<dyn std::error::Error>> {
    let response = client
        .post(format!("{}/process/{}", base_url, id))
        .json(&body)
        .send()
        .await?;
    let status = response.status();
    Ok((status, response.json().await?))
}

/// Poll job status until completed or failed (with timeout)
pub async fn poll_job_status(
    client: &reqwest::Client,
    base_url: &str,
    id: Uuid,
    timeout_secs: u64,
) -> Result<JobStatusResponse, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms
    let mut last_progress = 0;

    for _ in 0..max_attempts {
        let response = client
            .get(format!("{}/status/{}", base_url, id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let status_response = response.json::<JobStatusResponse>().await?;
        if status_response.progress < last_progress {
            return Err(format!(
                "Progress went backwards: {} -> {}",
                last_progress, status_response.progress
            )
            .into());
        }
        last_progress = status_response.progress;

        match status_response.status.as_str() {
            "completed" | "failed" => return Ok(status_response),
            "pending" | "processing" => sleep(Duration::from_millis(500)).await,
            other => return Err(format!("Unknown job status: {}", other).into()),
        }
    }

    Err(format!("Job did not finish within {} seconds", timeout_secs).into())
}
