//! Metrics module
//!
//! Prometheus counters and histograms for the upload engine.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "drive_uploads_total",
        "Total number of upload sessions",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "drive_upload_bytes_total",
        "Total bytes committed through upload sessions"
    ).unwrap();

    pub static ref UPLOAD_DURATION: Histogram = register_histogram!(
        "drive_upload_duration_seconds",
        "Upload session duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();

    // Fragment metrics
    pub static ref FRAGMENT_REQUESTS: Counter = register_counter!(
        "drive_fragment_requests_total",
        "Ranged fragment requests acknowledged by the remote store"
    ).unwrap();

    pub static ref FRAGMENT_BYTES: Counter = register_counter!(
        "drive_fragment_bytes_total",
        "Bytes sent in acknowledged fragment requests"
    ).unwrap();

    pub static ref FRAGMENTS_PER_UPLOAD: Histogram = register_histogram!(
        "drive_fragments_per_upload",
        "Number of fragment requests per completed upload",
        vec![1.0, 2.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0]
    ).unwrap();

    // Preload metrics
    pub static ref PRELOADS: CounterVec = register_counter_vec!(
        "drive_preloads_total",
        "Append preloads by outcome",
        &["outcome"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "drive_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&["success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure() {
    UPLOADS_TOTAL.with_label_values(&["failure"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(duration_secs: f64) {
    UPLOAD_DURATION.observe(duration_secs);
}

/// Record one acknowledged fragment request
pub fn record_fragment(bytes: u64) {
    FRAGMENT_REQUESTS.inc();
    FRAGMENT_BYTES.inc_by(bytes as f64);
}

/// Record how many fragment requests a completed upload took
pub fn record_fragments_per_upload(count: u64) {
    FRAGMENTS_PER_UPLOAD.observe(count as f64);
}

/// Record an append preload outcome
pub fn record_preload(outcome: &str) {
    PRELOADS.with_label_values(&[outcome]).inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Render the default registry in the Prometheus text format
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
