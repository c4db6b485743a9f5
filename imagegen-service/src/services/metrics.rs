//! Handler-level metrics for imagegen-service.
//!
//! Recorded through the `metrics` facade; they are exported by whatever
//! recorder `service_core::observability::init_metrics` installed, and are
//! no-ops when none is installed.

use metrics::{counter, histogram};
use std::time::Duration;

/// Count one handled generation request by outcome
/// (`ok`, `invalid`, `rate_limited`, `quota_error`, `provider_error`).
pub fn record_request(outcome: &'static str, byok: bool) {
    counter!(
        "imagegen_requests_total",
        "outcome" => outcome,
        "byok" => if byok { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_provider_latency(elapsed: Duration, success: bool) {
    histogram!(
        "imagegen_provider_latency_seconds",
        "status" => if success { "ok" } else { "error" }
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_quota_rejection() {
    counter!("imagegen_quota_rejections_total").increment(1);
}
