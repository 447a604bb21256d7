//! Metrics module
//!
//! Prometheus metrics for the upload pipeline, registered in the default
//! registry and exposed by [`server::MetricsServer`].

pub mod server;

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "tsukumo_uploads_total",
        "Total number of uploads",
        &["kind", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: CounterVec = register_counter_vec!(
        "tsukumo_upload_bytes_total",
        "Total bytes stored",
        &["kind"]
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "tsukumo_upload_duration_seconds",
        "Upload pipeline duration in seconds",
        &["kind"],
        vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    // External tool metrics
    pub static ref TOOL_DURATION: HistogramVec = register_histogram_vec!(
        "tsukumo_tool_duration_seconds",
        "ffmpeg / ffprobe run time in seconds",
        &["tool"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    // Auth metrics
    pub static ref AUTH_ATTEMPTS: CounterVec = register_counter_vec!(
        "tsukumo_auth_attempts_total",
        "Authentication attempts",
        &["method", "status"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "tsukumo_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(kind: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[kind, "success"]).inc();
    UPLOAD_BYTES_TOTAL
        .with_label_values(&[kind])
        .inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(kind: &str) {
    UPLOADS_TOTAL.with_label_values(&[kind, "failure"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(kind: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[kind])
        .observe(duration_secs);
}

/// Record how long an external tool ran
pub fn record_tool_duration(tool: &str, duration_secs: f64) {
    TOOL_DURATION
        .with_label_values(&[tool])
        .observe(duration_secs);
}

/// Record authentication attempt
pub fn record_auth_attempt(method: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    AUTH_ATTEMPTS.with_label_values(&[method, status]).inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_upload_success() {
        let before = UPLOADS_TOTAL
            .with_label_values(&["thumbnail", "success"])
            .get();
        record_upload_success("thumbnail", 1024);
        let after = UPLOADS_TOTAL
            .with_label_values(&["thumbnail", "success"])
            .get();
        assert!(after >= before + 1.0);
    }

    #[test]
    fn test_record_tool_duration() {
        record_tool_duration("ffprobe", 0.02);
        assert!(TOOL_DURATION.with_label_values(&["ffprobe"]).get_sample_count() >= 1);
    }

    #[test]
    fn test_record_auth_and_errors() {
        record_auth_attempt("jwt", false);
        record_error("forbidden");
        assert!(AUTH_ATTEMPTS.with_label_values(&["jwt", "failure"]).get() >= 1.0);
        assert!(ERRORS_TOTAL.with_label_values(&["forbidden"]).get() >= 1.0);
    }
}
