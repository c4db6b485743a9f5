use imagegen_service::config::ImagegenConfig;
use imagegen_service::startup::Application;
use service_core::observability::{init_metrics, init_tracing};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Tracing is configured from the loaded config, so report config errors directly.
    let config = ImagegenConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        "imagegen-service",
        &config.common.log_level,
        config.observability.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        environment = %config.environment,
        quota_enabled = config.quota.is_some(),
        proxied = config.observability.helicone_api_key.is_some(),
        "Starting imagegen-service"
    );

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    };

    let app = Application::build(config, metrics).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    app.run_until_stopped().await
}
