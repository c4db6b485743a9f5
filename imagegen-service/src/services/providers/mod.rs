//! Image provider abstractions and implementations.
//!
//! The handler talks to a trait object so the hosted backend (Together AI)
//! can be swapped for a mock in tests.

pub mod mock;
pub mod together;

use async_trait::async_trait;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::value::RawValue;
use thiserror::Error;

pub use mock::MockImageProvider;
pub use together::TogetherProvider;

/// Model used for every generation.
pub const DEFAULT_IMAGE_MODEL: &str = "black-forest-labs/FLUX.1-schnell";
pub const DEFAULT_IMAGE_WIDTH: u32 = 1024;
pub const DEFAULT_IMAGE_HEIGHT: u32 = 768;
/// Low step count: schnell trades quality for latency and cost.
pub const DEFAULT_IMAGE_STEPS: u32 = 3;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider returned no images")]
    EmptyResult,
}

/// How the provider should hand back image bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Inline base64 data in `b64_json`.
    Base64,
}

/// Generation parameters sent alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageGenerationParams {
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub response_format: ResponseFormat,
}

impl Default for ImageGenerationParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_IMAGE_MODEL.to_string(),
            width: DEFAULT_IMAGE_WIDTH,
            height: DEFAULT_IMAGE_HEIGHT,
            steps: DEFAULT_IMAGE_STEPS,
            response_format: ResponseFormat::Base64,
        }
    }
}

/// One generated image object exactly as the provider produced it.
///
/// The JSON is kept raw so it can be relayed without re-serialisation.
#[derive(Debug)]
pub struct GeneratedImage(Box<RawValue>);

impl GeneratedImage {
    pub fn from_raw(raw: Box<RawValue>) -> Self {
        Self(raw)
    }

    pub fn from_json(json: impl Into<String>) -> Result<Self, ProviderError> {
        RawValue::from_string(json.into())
            .map(Self)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    pub fn as_json(&self) -> &str {
        self.0.get()
    }
}

impl IntoResponse for GeneratedImage {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            self.0.get().to_owned(),
        )
            .into_response()
    }
}

/// Trait for image generation providers (e.g., Together AI).
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generate a single image for `prompt`.
    ///
    /// `api_key` overrides the provider's default credential for this call
    /// only; it is never stored.
    async fn create_image(
        &self,
        prompt: &str,
        params: &ImageGenerationParams,
        api_key: Option<&SecretString>,
    ) -> Result<GeneratedImage, ProviderError>;

    /// Whether a default credential is available without a per-request key.
    fn has_default_credential(&self) -> bool;
}
