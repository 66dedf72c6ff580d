//! Prometheus metrics setup and metric definitions

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const HTTP_REQUESTS_TOTAL: &str = "accounts_http_requests_total";
pub const HTTP_REQUEST_DURATION: &str = "accounts_http_request_duration_seconds";
pub const FORWARDED_REQUESTS_TOTAL: &str = "accounts_forwarded_requests_total";
pub const FORWARD_DURATION: &str = "accounts_forward_duration_seconds";
pub const COMPENSATIONS_TOTAL: &str = "accounts_compensations_total";
pub const CONSISTENCY_ALERTS_TOTAL: &str = "accounts_consistency_alerts_total";
pub const LOGIN_TOTAL: &str = "accounts_login_total";
pub const DOMAIN_VERIFICATIONS_TOTAL: &str = "accounts_domain_verifications_total";
pub const EXPIRED_ROWS_DELETED_TOTAL: &str = "accounts_expired_rows_deleted_total";

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    let buckets = vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions so HELP/TYPE lines appear from startup.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests");
    describe_histogram!(HTTP_REQUEST_DURATION, "HTTP request duration in seconds");

    describe_counter!(
        FORWARDED_REQUESTS_TOTAL,
        "Requests proxied to the owning region, by target region and outcome"
    );
    describe_histogram!(
        FORWARD_DURATION,
        "Round-trip time of proxied requests in seconds"
    );

    describe_counter!(
        COMPENSATIONS_TOTAL,
        "Compensating writes issued after a partial cross-store failure"
    );
    describe_counter!(
        CONSISTENCY_ALERTS_TOTAL,
        "Compensating writes that failed and left orphaned data behind"
    );

    describe_counter!(LOGIN_TOTAL, "Password login attempts by result");
    describe_counter!(
        DOMAIN_VERIFICATIONS_TOTAL,
        "Domain ownership checks by result"
    );
    describe_counter!(
        EXPIRED_ROWS_DELETED_TOTAL,
        "Expired sessions and short-lived tokens removed by cleanup"
    );

    counter!(CONSISTENCY_ALERTS_TOTAL).absolute(0);
}

/// Record one handled HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        HTTP_REQUEST_DURATION,
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}
