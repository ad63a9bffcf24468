//! Metrics module
//!
//! Prometheus counters for transfers. The CLI prints them in the text
//! exposition format on exit when `--print-metrics` is given.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec, Counter,
    CounterVec, Encoder, Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "r2_uplink_uploads_total",
        "Total number of uploads",
        &["strategy", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "r2_uplink_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "r2_uplink_upload_duration_seconds",
        "Upload duration in seconds",
        &["strategy"],
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]
    ).unwrap();

    // Multipart metrics
    pub static ref MULTIPART_UPLOADS: CounterVec = register_counter_vec!(
        "r2_uplink_multipart_uploads_total",
        "Total multipart uploads",
        &["status"]
    ).unwrap();

    pub static ref MULTIPART_PARTS: Histogram = register_histogram!(
        "r2_uplink_multipart_parts",
        "Number of parts per multipart upload",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 10000.0]
    ).unwrap();

    pub static ref PARTS_UPLOADED: Counter = register_counter!(
        "r2_uplink_parts_uploaded_total",
        "Individual parts acknowledged by the backend"
    ).unwrap();

    // Hub metrics
    pub static ref HUB_DOWNLOADS: CounterVec = register_counter_vec!(
        "r2_uplink_hub_downloads_total",
        "Dataset hub downloads",
        &["status"]
    ).unwrap();

    pub static ref HUB_DOWNLOAD_BYTES: Counter = register_counter!(
        "r2_uplink_hub_download_bytes_total",
        "Bytes downloaded from the dataset hub"
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "r2_uplink_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(strategy: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[strategy, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(strategy: &str) {
    UPLOADS_TOTAL.with_label_values(&[strategy, "failure"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(strategy: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[strategy])
        .observe(duration_secs);
}

/// Record a successful multipart upload
pub fn record_multipart_upload_success(parts_count: usize) {
    MULTIPART_UPLOADS.with_label_values(&["success"]).inc();
    MULTIPART_PARTS.observe(parts_count as f64);
}

/// Record a failed multipart upload
pub fn record_multipart_upload_failure() {
    MULTIPART_UPLOADS.with_label_values(&["failure"]).inc();
}

/// Record one acknowledged part
pub fn record_part_uploaded() {
    PARTS_UPLOADED.inc();
}

/// Record a finished hub download
pub fn record_hub_download(success: bool, bytes: u64) {
    let status = if success { "success" } else { "failure" };
    HUB_DOWNLOADS.with_label_values(&[status]).inc();
    HUB_DOWNLOAD_BYTES.inc_by(bytes as f64);
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
