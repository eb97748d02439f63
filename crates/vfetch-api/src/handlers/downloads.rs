//! Video fetch and file download handlers.

use std::time::Instant;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::metrics::{record_fetch_duration, record_upload_duration};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DownloadRequest {
    pub url: Option<String>,
    /// yt-dlp format selector, passed through verbatim
    pub format_id: Option<String>,
}

#[derive(Serialize)]
pub struct DownloadResponse {
    pub success: bool,
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    /// Minutes until the stored file is deleted
    #[serde(rename = "expiresIn")]
    pub expires_in: u64,
}

/// Validate that the submitted URL is a well-formed http(s) URL.
fn validate_url(raw: &str) -> ApiResult<Url> {
    let parsed =
        Url::parse(raw).map_err(|_| ApiError::bad_request("A valid http(s) URL is required"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(ApiError::bad_request("A valid http(s) URL is required")),
    }
}

/// Fetch a video, upload it to storage, and schedule its deletion.
///
/// POST /download
pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<Json<DownloadResponse>> {
    let url = match request.url.as_deref() {
        Some(u) if !u.is_empty() => u,
        _ => return Err(ApiError::bad_request("URL is required")),
    };
    let url = validate_url(url)?;

    let file_name = format!("{}.mp4", Uuid::new_v4());
    let local_path = state.config.download_dir.join(&file_name);

    let fetch_start = Instant::now();
    let fetch_result = vfetch_media::fetch_video(
        url.as_str(),
        request.format_id.as_deref(),
        &local_path,
    )
    .await;
    record_fetch_duration(fetch_start.elapsed().as_secs_f64());
    fetch_result?;

    let object_key = format!("videos/{}", file_name);

    let upload_start = Instant::now();
    let upload_result = state
        .storage
        .upload_file(&local_path, &object_key, "video/mp4")
        .await;
    record_upload_duration(upload_start.elapsed().as_secs_f64());

    // The local copy is spent either way once the upload has been attempted.
    if let Err(e) = tokio::fs::remove_file(&local_path).await {
        warn!("Failed to remove local file {}: {}", local_path.display(), e);
    }
    upload_result?;

    let handle = state.lifecycle.on_upload_succeeded(object_key.as_str());
    info!(
        key = %object_key,
        fire_at = %handle.fire_at(),
        "Video uploaded; download link issued"
    );

    let download_url = format!(
        "{}/download-file?filePath={}",
        state.config.public_base_url(),
        object_key
    );

    Ok(Json(DownloadResponse {
        success: true,
        download_url,
        expires_in: state.lifecycle.policy().expires_in_minutes(),
    }))
}

#[derive(Deserialize)]
pub struct DownloadFileQuery {
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
}

/// Reject empty keys and anything that walks out of the bucket namespace.
fn validate_file_path(path: &str) -> ApiResult<()> {
    if path.is_empty() {
        return Err(ApiError::bad_request("File path is required"));
    }
    if path.contains("..") || path.starts_with('/') || path.contains('\\') {
        return Err(ApiError::bad_request("Invalid file path"));
    }
    Ok(())
}

/// Serve a stored object as a file attachment.
///
/// GET /download-file?filePath=videos/<name>.mp4
pub async fn download_file(
    State(state): State<AppState>,
    Query(query): Query<DownloadFileQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let file_path = match query.file_path.as_deref() {
        Some(p) => p,
        None => return Err(ApiError::bad_request("File path is required")),
    };
    validate_file_path(file_path)?;

    let range_header = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let object = state
        .storage
        .download_object(file_path, range_header.as_deref())
        .await
        .map_err(|e| {
            if matches!(e, vfetch_storage::StorageError::NotFound(_)) {
                ApiError::not_found("File not found")
            } else {
                ApiError::Storage(e)
            }
        })?;

    let filename = file_path.rsplit('/').next().unwrap_or(file_path);

    // Force a save-as in the browser rather than inline playback.
    let mut response_builder = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::ACCEPT_RANGES, "bytes");

    if range_header.is_some() {
        response_builder = response_builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_LENGTH, object.bytes.len());
    } else {
        response_builder = response_builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, object.content_length);
    }

    response_builder
        .body(Body::from(object.bytes))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}
