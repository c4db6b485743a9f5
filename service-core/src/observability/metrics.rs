use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Histogram buckets for request and upstream latencies, in seconds.
///
/// Image generation is slow compared to ordinary API traffic, so the upper
/// buckets reach well past the usual 10s ceiling.
const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Install the global Prometheus recorder and return a handle for rendering.
///
/// Fails if a recorder is already installed in this process.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()
}

/// Render the metrics exposition, or a placeholder when no recorder is installed.
pub fn render_metrics(handle: Option<&PrometheusHandle>) -> String {
    handle
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}
