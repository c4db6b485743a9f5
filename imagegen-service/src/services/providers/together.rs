//! Together AI image provider.
//!
//! Calls the OpenAI-compatible `/images/generations` endpoint. When a
//! Helicone key is configured the same request goes through the Helicone
//! gateway instead, with the key attached as `Helicone-Auth`.

use super::{GeneratedImage, ImageGenerationParams, ImageProvider, ProviderError};
use crate::config::{ObservabilityConfig, TogetherConfig};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client, StatusCode,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::time::Duration;

const HELICONE_AUTH_HEADER: &str = "helicone-auth";

/// Together AI image provider.
pub struct TogetherProvider {
    api_key: Option<SecretString>,
    base_url: String,
    client: Client,
    proxied: bool,
}

impl TogetherProvider {
    pub fn new(
        config: &TogetherConfig,
        observability: &ObservabilityConfig,
    ) -> Result<Self, ProviderError> {
        let mut default_headers = HeaderMap::new();

        let (base_url, proxied) = match &observability.helicone_api_key {
            Some(helicone_key) => {
                let mut value =
                    HeaderValue::from_str(&format!("Bearer {}", helicone_key.expose_secret()))
                        .map_err(|e| {
                            ProviderError::NotConfigured(format!(
                                "Helicone API key is not a valid header value: {}",
                                e
                            ))
                        })?;
                value.set_sensitive(true);
                default_headers.insert(HELICONE_AUTH_HEADER, value);
                (observability.helicone_base_url.clone(), true)
            }
            None => (config.base_url.clone(), false),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| {
                ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            proxied,
        })
    }

    /// Whether calls are routed through the observability proxy.
    pub fn is_proxied(&self) -> bool {
        self.proxied
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn images_url(&self) -> String {
        format!("{}/images/generations", self.base_url)
    }
}

#[async_trait]
impl ImageProvider for TogetherProvider {
    async fn create_image(
        &self,
        prompt: &str,
        params: &ImageGenerationParams,
        api_key: Option<&SecretString>,
    ) -> Result<GeneratedImage, ProviderError> {
        let api_key = api_key.or(self.api_key.as_ref()).ok_or_else(|| {
            ProviderError::NotConfigured(
                "No Together API key configured and none supplied with the request".to_string(),
            )
        })?;

        let request = ImagesRequest { prompt, params };

        tracing::debug!(
            model = %params.model,
            width = params.width,
            height = params.height,
            steps = params.steps,
            prompt_len = prompt.len(),
            proxied = self.proxied,
            "Sending request to Together images API"
        );

        let response = self
            .client
            .post(self.images_url())
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = api_error_message(&error_text);

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ProviderError::RateLimited(message));
            }

            return Err(ProviderError::ApiError(format!(
                "Together API error {}: {}",
                status, message
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let api_response: ImagesResponse = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let image = api_response
            .data
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResult)?;

        Ok(GeneratedImage::from_raw(image))
    }

    fn has_default_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Pull `error.message` out of a Together error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|e| e.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string())
}

// ============================================================================
// Together API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ImagesRequest<'a> {
    prompt: &'a str,
    #[serde(flatten)]
    params: &'a ImageGenerationParams,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}
