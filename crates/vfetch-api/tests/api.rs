//! API integration tests.
//!
//! The storage client is constructed against a dummy endpoint; no request
//! in this suite reaches it, so everything runs offline.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use vfetch_api::{create_router, ApiConfig, AppState, StorageDeleter};
use vfetch_expiry::{ExpiryPolicy, LifecycleCoordinator, TimerRegistry};
use vfetch_storage::{StorageClient, StorageConfig};

async fn test_state() -> AppState {
    let storage = StorageClient::new(StorageConfig {
        endpoint_url: "http://localhost:9000".to_string(),
        access_key_id: "test".to_string(),
        secret_access_key: "test".to_string(),
        bucket_name: "videos".to_string(),
        region: "auto".to_string(),
    })
    .await
    .expect("storage client");
    let storage = Arc::new(storage);

    let deleter = Arc::new(StorageDeleter::new(Arc::clone(&storage)));
    let lifecycle = LifecycleCoordinator::new(
        TimerRegistry::new(),
        ExpiryPolicy::new(std::time::Duration::from_secs(3600)),
        deleter,
    );

    AppState {
        config: ApiConfig::default(),
        storage,
        lifecycle: Arc::new(lifecycle),
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Test health endpoint.
#[tokio::test]
async fn test_health_endpoint() {
    let app = create_router(test_state().await, None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

/// Test that /download rejects a missing URL.
#[tokio::test]
async fn test_download_requires_url() {
    let app = create_router(test_state().await, None);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/download")
                .header("Content-Type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["detail"], "URL is required");
}

/// Test that /download rejects non-http(s) URLs.
#[tokio::test]
async fn test_download_rejects_non_http_url() {
    let app = create_router(test_state().await, None);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/download")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"url": "file:///etc/passwd"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test that /download-file requires the filePath parameter.
#[tokio::test]
async fn test_download_file_requires_file_path() {
    let app = create_router(test_state().await, None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/download-file")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["detail"], "File path is required");
}

/// Test that /download-file rejects path traversal.
#[tokio::test]
async fn test_download_file_rejects_traversal() {
    let app = create_router(test_state().await, None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/download-file?filePath=videos/../secrets.txt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test that /cleanup-jobs reports how many deletions it cancelled.
#[tokio::test]
async fn test_cleanup_jobs_reports_count() {
    let state = test_state().await;
    state.lifecycle.on_upload_succeeded("videos/a.mp4");
    state.lifecycle.on_upload_succeeded("videos/b.mp4");
    assert_eq!(state.lifecycle.pending_jobs(), 2);

    let app = create_router(state.clone(), None);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/cleanup-jobs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["cancelled"], 2);
    assert_eq!(body["message"], "All deletion jobs cancelled");
    assert_eq!(state.lifecycle.pending_jobs(), 0);
}

/// Test security headers and request id propagation.
#[tokio::test]
async fn test_security_headers() {
    let app = create_router(test_state().await, None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert!(headers.contains_key("X-Content-Type-Options"));
    assert!(headers.contains_key("X-Frame-Options"));
    assert!(headers.contains_key("X-Request-ID"));
}

/// Test CORS preflight on the download endpoint.
#[tokio::test]
async fn test_cors_preflight() {
    let app = create_router(test_state().await, None);

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/download")
                .header("Origin", "http://localhost:3000")
                .header("Access-Control-Request-Method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        response.status() == StatusCode::OK || response.status() == StatusCode::NO_CONTENT
    );
    assert!(response
        .headers()
        .contains_key("Access-Control-Allow-Origin"));
}

/// Test metrics endpoint rendering when enabled.
#[tokio::test]
async fn test_metrics_endpoint() {
    // Sole installer of the global recorder in this test binary.
    let handle = vfetch_api::metrics::init_metrics();
    let app = create_router(test_state().await, Some(handle));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
