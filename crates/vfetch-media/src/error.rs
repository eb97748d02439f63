//! Error types for media fetching.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while fetching a video.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("Fetch failed: {message}")]
    FetchFailed { message: String },

    #[error("Fetched file missing: {0}")]
    OutputMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a fetch failure error.
    pub fn fetch_failed(message: impl Into<String>) -> Self {
        Self::FetchFailed {
            message: message.into(),
        }
    }
}
