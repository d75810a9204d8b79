use std::sync::Arc;

use crate::services::store::JobStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<JobStore>,
    /// Largest accepted image payload, in bytes.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: JobStore, max_upload_bytes: usize) -> Self {
        Self {
            store: Arc::new(store),
            max_upload_bytes,
        }
    }
}
