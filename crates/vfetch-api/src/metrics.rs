//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use vfetch_expiry::{ArtifactKey, ExpiryObserver};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vfetch_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vfetch_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vfetch_http_requests_in_flight";

    // Fetch/upload pipeline metrics
    pub const FETCH_DURATION_SECONDS: &str = "vfetch_fetch_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "vfetch_upload_duration_seconds";

    // Expiry metrics
    pub const EXPIRY_SCHEDULED_TOTAL: &str = "vfetch_expiry_scheduled_total";
    pub const EXPIRY_SUPERSEDED_TOTAL: &str = "vfetch_expiry_superseded_total";
    pub const EXPIRY_FIRED_TOTAL: &str = "vfetch_expiry_fired_total";
    pub const EXPIRY_CANCELLED_TOTAL: &str = "vfetch_expiry_cancelled_total";
    pub const EXPIRY_PENDING_JOBS: &str = "vfetch_expiry_pending_jobs";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record yt-dlp fetch duration.
pub fn record_fetch_duration(duration_secs: f64) {
    histogram!(names::FETCH_DURATION_SECONDS).record(duration_secs);
}

/// Record storage upload duration.
pub fn record_upload_duration(duration_secs: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    // Increment in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    // Decrement in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

/// Feeds expiry registry events into Prometheus counters and the
/// pending-jobs gauge.
pub struct ExpiryMetrics;

impl ExpiryObserver for ExpiryMetrics {
    fn job_scheduled(&self, _key: &ArtifactKey, _fire_at: DateTime<Utc>) {
        counter!(names::EXPIRY_SCHEDULED_TOTAL).increment(1);
        gauge!(names::EXPIRY_PENDING_JOBS).increment(1.0);
    }

    fn job_superseded(&self, _key: &ArtifactKey) {
        counter!(names::EXPIRY_SUPERSEDED_TOTAL).increment(1);
        gauge!(names::EXPIRY_PENDING_JOBS).decrement(1.0);
    }

    fn job_fired(&self, _key: &ArtifactKey, outcome: &anyhow::Result<()>) {
        let outcome_label = if outcome.is_ok() { "ok" } else { "error" };
        let labels = [("outcome", outcome_label.to_string())];
        counter!(names::EXPIRY_FIRED_TOTAL, &labels).increment(1);
        gauge!(names::EXPIRY_PENDING_JOBS).decrement(1.0);
    }

    fn job_cancelled(&self, _key: &ArtifactKey) {
        counter!(names::EXPIRY_CANCELLED_TOTAL).increment(1);
        gauge!(names::EXPIRY_PENDING_JOBS).decrement(1.0);
    }

    fn jobs_cancelled(&self, count: usize) {
        if count > 0 {
            counter!(names::EXPIRY_CANCELLED_TOTAL).increment(count as u64);
            gauge!(names::EXPIRY_PENDING_JOBS).decrement(count as f64);
        }
    }
}
