use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder and describe the job metrics.
pub fn install_recorder() -> Result<Arc<PrometheusHandle>, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!("image_jobs_uploaded_total", "Total images accepted for processing");
    metrics::describe_counter!("image_jobs_completed_total", "Total processing runs that completed");
    metrics::describe_counter!("image_jobs_failed_total", "Total processing runs that failed");
    metrics::describe_histogram!(
        "image_processing_seconds",
        "Time from the start of a processing run to completion"
    );
    metrics::describe_counter!(
        "job_store_fallback_total",
        "Job store operations served by the in-memory fallback"
    );

    Ok(Arc::new(handle))
}

/// GET /metrics — Prometheus text exposition.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
