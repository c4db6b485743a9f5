use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;
use service_core::observability::render_metrics;

use crate::startup::AppState;

/// Health check endpoint for Docker/K8s liveness probes.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "imagegen-service",
            "version": env!("CARGO_PKG_VERSION"),
            "quota": state.quota.is_some(),
        })),
    )
}

/// Readiness check endpoint for K8s readiness probes.
///
/// Ready as soon as the quota store, when one is configured, answers.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    if let Some(quota) = &state.quota {
        quota.health_check().await.map_err(|e| {
            tracing::warn!(error = %e, "Quota store not ready");
            AppError::ServiceUnavailable
        })?;
    }

    Ok(StatusCode::OK)
}

/// Prometheus exposition.
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        render_metrics(state.metrics.as_ref()),
    )
}
