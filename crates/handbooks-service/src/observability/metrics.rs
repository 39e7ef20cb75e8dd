//! Metrics definitions for the Handbooks service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `hb_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `operation`: fixed by code (register, login, refresh, select, insert, ...)
//! - `status`: success, error
//! - `error_category`: the `JwtValidationError::category` values plus `revoked`
//! - `table`: one per entity
//! - `method`: standard HTTP methods, anything else is `OTHER`
//! - `path`: route template with ids replaced by `{id}`, unknown paths are
//!   `/unmatched`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use uuid::Uuid;

/// Initialize the Prometheus recorder and return the handle that renders
/// `/metrics`.
///
/// # Errors
///
/// Returns an error if a recorder is already installed in this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("hb_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("hb_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        // bcrypt dominates login and register latency
        .set_buckets_for_metric(
            Matcher::Prefix("hb_bcrypt".to_string()),
            &[0.010, 0.050, 0.100, 0.200, 0.300, 0.500, 1.000, 2.000],
        )
        .map_err(|e| format!("Failed to set bcrypt buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("hb_token_issuance".to_string()),
            &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token pair issuance duration and outcome
///
/// Metric: `hb_token_issuance_duration_seconds`, `hb_token_issuance_total`
/// Labels: `operation`, `status`
pub fn record_token_issuance(operation: &str, status: &str, duration: Duration) {
    histogram!("hb_token_issuance_duration_seconds", "operation" => operation.to_string(), "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("hb_token_issuance_total", "operation" => operation.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record token validation result at the auth gate
///
/// Metric: `hb_token_validations_total`
/// Labels: `status`, `error_category`
pub fn record_token_validation(status: &str, error_category: Option<&str>) {
    let category = error_category.unwrap_or("none");
    counter!("hb_token_validations_total", "status" => status.to_string(), "error_category" => category.to_string())
        .increment(1);
}

/// Record bcrypt operation duration
///
/// Metric: `hb_bcrypt_duration_seconds`
/// Labels: `operation` (hash, verify)
pub fn record_bcrypt_duration(operation: &str, duration: Duration) {
    histogram!("hb_bcrypt_duration_seconds", "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}

// ============================================================================
// Store and Cache Metrics
// ============================================================================

/// Record database statement execution
///
/// Metric: `hb_db_query_duration_seconds`, `hb_db_queries_total`
/// Labels: `operation`, `table`, `status`
pub fn record_db_query(operation: &str, table: &str, status: &str, duration: Duration) {
    histogram!("hb_db_query_duration_seconds", "operation" => operation.to_string(), "table" => table.to_string())
        .record(duration.as_secs_f64());

    counter!("hb_db_queries_total", "operation" => operation.to_string(), "table" => table.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record token cache operation
///
/// Metric: `hb_cache_operations_total`
/// Labels: `operation` (store, exists, remove), `status`
pub fn record_cache_operation(operation: &str, status: &str) {
    counter!("hb_cache_operations_total", "operation" => operation.to_string(), "status" => status.to_string())
        .increment(1);
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `hb_http_requests_total`, `hb_http_request_duration_seconds`
/// Labels: `method`, `path`, `status_code`
///
/// Includes framework-level responses (404, 405, 408 timeouts).
pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let normalized_path = normalize_path(path);
    let method = normalize_method(method);

    histogram!("hb_http_request_duration_seconds",
        "method" => method,
        "path" => normalized_path,
        "status_code" => status_code.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("hb_http_requests_total",
        "method" => method,
        "path" => normalized_path,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn normalize_method(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "POST" => "POST",
        "PUT" => "PUT",
        "PATCH" => "PATCH",
        "DELETE" => "DELETE",
        "OPTIONS" => "OPTIONS",
        "HEAD" => "HEAD",
        _ => "OTHER",
    }
}

/// Route templates served by the router. `{id}` matches a UUID segment.
const ROUTE_TEMPLATES: &[&str] = &[
    "/health",
    "/metrics",
    "/api/v1/auth/register",
    "/api/v1/auth/login",
    "/api/v1/auth/refresh",
    "/api/v1/auth/logout",
    "/api/v1/users/me",
    "/api/v1/users/{id}",
    "/api/v1/courses",
    "/api/v1/courses/{id}",
    "/api/v1/courses/{id}/sections",
    "/api/v1/courses/{id}/sections/{id}",
    "/api/v1/courses/{id}/sections/{id}/lessons",
    "/api/v1/courses/{id}/sections/{id}/lessons/{id}",
];

/// Label for any path that matches no route template.
pub const UNMATCHED_PATH: &str = "/unmatched";

/// Normalize a request path to its route template so the `path` label
/// stays bounded. Anything that is not a served route, including a known
/// route with a malformed id, collapses to [`UNMATCHED_PATH`].
fn normalize_path(path: &str) -> &'static str {
    ROUTE_TEMPLATES
        .iter()
        .copied()
        .find(|template| matches_template(template, path))
        .unwrap_or(UNMATCHED_PATH)
}

fn matches_template(template: &str, path: &str) -> bool {
    let mut expected = template.split('/');
    let mut actual = path.split('/');
    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return true,
            (Some("{id}"), Some(segment)) if Uuid::parse_str(segment).is_ok() => {}
            (Some(want), Some(segment)) if want != "{id}" && want == segment => {}
            _ => return false,
        }
    }
}
