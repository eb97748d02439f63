//! Deletion-job administration handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct CleanupJobsResponse {
    pub success: bool,
    /// How many pending deletions were cancelled
    pub cancelled: usize,
    pub message: String,
}

/// Cancel every pending deletion job. Stored objects are left in place.
///
/// POST /cleanup-jobs
pub async fn cleanup_jobs(State(state): State<AppState>) -> Json<CleanupJobsResponse> {
    let cancelled = state.lifecycle.on_cleanup_requested();

    Json(CleanupJobsResponse {
        success: true,
        cancelled,
        message: "All deletion jobs cancelled".to_string(),
    })
}
