//! Mock provider implementation for testing.

use super::{GeneratedImage, ImageGenerationParams, ImageProvider, ProviderError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Mutex;

/// Image object returned by a succeeding mock.
pub const MOCK_IMAGE_JSON: &str =
    r#"{"index":0,"b64_json":"iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==","timings":{"inference":0.41}}"#;

/// A call observed by [`MockImageProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub prompt: String,
    pub params: ImageGenerationParams,
    /// The credential actually used for the call.
    pub api_key: Option<String>,
}

enum Behaviour {
    Succeed(String),
    Fail(String),
}

/// Mock image provider for testing.
pub struct MockImageProvider {
    behaviour: Behaviour,
    default_api_key: Option<SecretString>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockImageProvider {
    /// Succeeds with [`MOCK_IMAGE_JSON`].
    pub fn new() -> Self {
        Self::succeeding(MOCK_IMAGE_JSON)
    }

    pub fn succeeding(image_json: &str) -> Self {
        Self {
            behaviour: Behaviour::Succeed(image_json.to_string()),
            default_api_key: Some(SecretString::new("mock-default-key".to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with a network error carrying `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            behaviour: Behaviour::Fail(message.to_string()),
            default_api_key: Some(SecretString::new("mock-default-key".to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default_api_key(mut self, api_key: Option<&str>) -> Self {
        self.default_api_key = api_key.map(|k| SecretString::new(k.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl Default for MockImageProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageProvider for MockImageProvider {
    async fn create_image(
        &self,
        prompt: &str,
        params: &ImageGenerationParams,
        api_key: Option<&SecretString>,
    ) -> Result<GeneratedImage, ProviderError> {
        let api_key = api_key.or(self.default_api_key.as_ref());

        self.calls
            .lock()
            .map_err(|e| ProviderError::ApiError(format!("Mock provider mutex poisoned: {}", e)))?
            .push(RecordedCall {
                prompt: prompt.to_string(),
                params: params.clone(),
                api_key: api_key.map(|k| k.expose_secret().clone()),
            });

        if api_key.is_none() {
            return Err(ProviderError::NotConfigured(
                "Mock provider has no API key".to_string(),
            ));
        }

        tracing::info!(prompt_len = prompt.len(), "[MOCK] Image would be generated");

        match &self.behaviour {
            Behaviour::Succeed(json) => GeneratedImage::from_json(json.clone()),
            Behaviour::Fail(message) => Err(ProviderError::NetworkError(message.clone())),
        }
    }

    fn has_default_credential(&self) -> bool {
        self.default_api_key.is_some()
    }
}
