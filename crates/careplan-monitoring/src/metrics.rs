//! Operation metrics recorded through the `metrics` facade.
//!
//! Without an installed recorder every call is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, histogram};

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn metric recording on or off process-wide
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

/// Whether metrics are currently recorded
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Plan service metrics
pub struct PlanMetrics;

impl PlanMetrics {
    /// Record a plan fetch
    pub fn record_fetch() {
        if is_enabled() {
            counter!("careplan_plan_fetch_total", 1);
        }
    }

    /// Record a plan save attempt
    pub fn record_save(success: bool, duration_ms: f64) {
        if !is_enabled() {
            return;
        }
        let outcome = if success { "success" } else { "failure" };
        counter!("careplan_plan_save_total", 1, "outcome" => outcome);
        histogram!("careplan_plan_save_duration_ms", duration_ms);
    }
}

/// HTTP server metrics
pub struct ServerMetrics;

impl ServerMetrics {
    /// Record an HTTP request
    pub fn record_http_request(path: &str, method: &str, status_code: u16) {
        if is_enabled() {
            counter!(
                "careplan_http_requests_total",
                1,
                "path" => path.to_string(),
                "method" => method.to_string(),
                "status" => status_code.to_string()
            );
        }
    }
}
