use crate::services::{ProviderError, QuotaDecision, QuotaError};
use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use thiserror::Error;

/// Body of every 429 response, serialised as a JSON string.
pub const QUOTA_EXHAUSTED_MESSAGE: &str =
    "No requests left. Please add your own API key or try again in 24h.";

/// Body message for any quota store failure.
pub const QUOTA_UNAVAILABLE_MESSAGE: &str = "Quota store unavailable";

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Failures of the image generation endpoint. Every variant ends the request.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Invalid request body: {}", .0.body_text())]
    MalformedBody(#[from] JsonRejection),

    #[error("{}", QUOTA_EXHAUSTED_MESSAGE)]
    RateLimitExceeded(QuotaDecision),

    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl GenerateError {
    /// Metric label for this failure.
    pub fn outcome(&self) -> &'static str {
        match self {
            GenerateError::MalformedBody(_) => "invalid",
            GenerateError::RateLimitExceeded(_) => "rate_limited",
            GenerateError::Quota(_) => "quota_error",
            GenerateError::Provider(_) => "provider_error",
        }
    }
}

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        match self {
            GenerateError::MalformedBody(rejection) => {
                AppError::BadRequest(anyhow::anyhow!(rejection.body_text())).into_response()
            }
            GenerateError::RateLimitExceeded(decision) => {
                let reset_secs = decision.reset_after.as_secs();
                let mut res =
                    (StatusCode::TOO_MANY_REQUESTS, Json(QUOTA_EXHAUSTED_MESSAGE)).into_response();

                let headers = res.headers_mut();
                headers.insert(axum::http::header::RETRY_AFTER, reset_secs.into());
                headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
                headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
                headers.insert(X_RATELIMIT_RESET, reset_secs.into());
                res
            }
            // Store errors carry connection details; the handler has already logged them.
            GenerateError::Quota(_) => internal_error(QUOTA_UNAVAILABLE_MESSAGE.to_string()),
            GenerateError::Provider(err) => internal_error(err.to_string()),
        }
    }
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rate_limit_response_carries_quota_headers() {
        let response = GenerateError::RateLimitExceeded(QuotaDecision {
            success: false,
            limit: 100,
            remaining: 0,
            reset_after: Duration::from_secs(3600),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers.get("retry-after").unwrap(), "3600");
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "100");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "0");
        assert_eq!(headers.get("x-ratelimit-reset").unwrap(), "3600");
    }

    #[test]
    fn provider_errors_are_internal() {
        let response =
            GenerateError::Provider(ProviderError::NetworkError("boom".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn quota_store_errors_do_not_leak_details() {
        let response = GenerateError::Quota(QuotaError::Unavailable(
            "redis://:hunter2@10.0.0.5:6379 connection refused".to_string(),
        ))
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "Quota store unavailable" }));
    }

    #[test]
    fn outcomes_are_labelled() {
        assert_eq!(
            GenerateError::Provider(ProviderError::EmptyResult).outcome(),
            "provider_error"
        );
        assert_eq!(
            GenerateError::Quota(QuotaError::Unavailable("down".to_string())).outcome(),
            "quota_error"
        );
    }
}
