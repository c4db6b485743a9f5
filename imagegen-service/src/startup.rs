//! Application startup and lifecycle management.
//!
//! Builds the shared state once from configuration, wires the HTTP router and
//! runs the server until a shutdown signal arrives.

use crate::config::ImagegenConfig;
use crate::handlers;
use crate::services::{ImageGenerationParams, ImageProvider, QuotaStore, RedisQuota, TogetherProvider};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state.
///
/// Built once at startup and never mutated afterwards; per-request values such
/// as a caller's own API key are passed down the call chain instead.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn ImageProvider>,
    /// `None` when no quota store is configured.
    pub quota: Option<Arc<dyn QuotaStore>>,
    pub image_params: ImageGenerationParams,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(provider: Arc<dyn ImageProvider>, quota: Option<Arc<dyn QuotaStore>>) -> Self {
        Self {
            provider,
            quota,
            image_params: ImageGenerationParams::default(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/generateImages", post(handlers::generate_images))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(
        config: ImagegenConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, AppError> {
        let provider = TogetherProvider::new(&config.together, &config.observability)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        if provider.is_proxied() {
            tracing::info!(base_url = %provider.base_url(), "Routing provider calls through Helicone");
        } else {
            tracing::info!(base_url = %provider.base_url(), "Initialized Together image provider");
        }
        if !provider.has_default_credential() {
            tracing::warn!("No default Together API key; only requests carrying userAPIKey will succeed");
        }

        let quota: Option<Arc<dyn QuotaStore>> = match &config.quota {
            Some(quota_config) => {
                let store = RedisQuota::new(quota_config).await.map_err(|e| {
                    tracing::error!("Failed to connect to quota store: {}", e);
                    AppError::InternalError(anyhow::anyhow!(e))
                })?;
                Some(Arc::new(store) as Arc<dyn QuotaStore>)
            }
            None => {
                tracing::info!("REDIS_URL not set, rate limiting disabled");
                None
            }
        };

        let mut state = AppState::new(Arc::new(provider), quota);
        if let Some(handle) = metrics {
            state = state.with_metrics(handle);
        }

        Self::with_state(config.common.port, state).await
    }

    /// Bind a listener for an already assembled state (port 0 = random port for testing).
    pub async fn with_state(port: u16, state: AppState) -> Result<Self, AppError> {
        let http_addr = SocketAddr::from(([0, 0, 0, 0], port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("Imagegen service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.http_listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
