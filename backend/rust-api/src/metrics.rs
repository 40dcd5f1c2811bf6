use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref OTP_ISSUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "otp_issued_total",
        "Total number of one-time codes issued",
        &["purpose"]
    )
    .unwrap();

    pub static ref OTP_VERIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "otp_verifications_total",
        "Total number of one-time code verification attempts",
        &["purpose", "outcome"]
    )
    .unwrap();

    pub static ref USERS_REGISTERED_TOTAL: IntCounter = register_int_counter!(
        "users_registered_total",
        "Total number of accounts created"
    )
    .unwrap();

    pub static ref LOGINS_TOTAL: IntCounter = register_int_counter!(
        "logins_total",
        "Total number of successful logins"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}
