use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::time::Instant;

use crate::handlers::error::GenerateError;
use crate::services::{metrics as service_metrics, GeneratedImage};
use crate::startup::AppState;
use crate::utils::rate_limit_identifier;

/// Any string is accepted as a prompt, including the empty one.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateImageRequest {
    pub prompt: String,
    /// Caller's own provider key. Bypasses the shared quota.
    #[serde(
        default,
        rename = "userAPIKey",
        deserialize_with = "deserialize_present_string"
    )]
    pub user_api_key: Option<String>,
}

/// The field may be omitted, but when present it must be a string; `null` is rejected.
fn deserialize_present_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Some)
}

impl GenerateImageRequest {
    /// The per-request credential, if one was supplied. Empty strings count as absent.
    pub fn api_key_override(&self) -> Option<SecretString> {
        self.user_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(|key| SecretString::new(key.to_string()))
    }
}

/// `POST /api/generateImages`
#[tracing::instrument(skip_all, fields(byok = tracing::field::Empty))]
pub async fn generate_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateImageRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::info!(error = %rejection.body_text(), "Rejected malformed request body");
            let err = GenerateError::from(rejection);
            service_metrics::record_request(err.outcome(), false);
            return err.into_response();
        }
    };

    let api_key = request.api_key_override();
    let byok = api_key.is_some();
    tracing::Span::current().record("byok", byok);

    match generate(&state, &headers, &request.prompt, api_key).await {
        Ok(image) => {
            service_metrics::record_request("ok", byok);
            image.into_response()
        }
        Err(err) => {
            service_metrics::record_request(err.outcome(), byok);
            err.into_response()
        }
    }
}

async fn generate(
    state: &AppState,
    headers: &HeaderMap,
    prompt: &str,
    api_key: Option<SecretString>,
) -> Result<GeneratedImage, GenerateError> {
    if api_key.is_none() {
        if let Some(quota) = &state.quota {
            let identifier = rate_limit_identifier(headers);

            let decision = quota.check_and_consume(&identifier).await.map_err(|e| {
                tracing::error!(identifier = %identifier, error = %e, "Quota check failed");
                e
            })?;

            if !decision.success {
                service_metrics::record_quota_rejection();
                tracing::warn!(
                    identifier = %identifier,
                    limit = decision.limit,
                    reset_after_secs = decision.reset_after.as_secs(),
                    "Quota exhausted"
                );
                return Err(GenerateError::RateLimitExceeded(decision));
            }

            tracing::debug!(
                identifier = %identifier,
                remaining = decision.remaining,
                "Quota consumed"
            );
        }
    }

    let start = Instant::now();
    let result = state
        .provider
        .create_image(prompt, &state.image_params, api_key.as_ref())
        .await;
    service_metrics::record_provider_latency(start.elapsed(), result.is_ok());

    let image = result.map_err(|e| {
        tracing::error!(error = %e, "Image generation failed");
        e
    })?;

    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Image generated"
    );

    Ok(image)
}
