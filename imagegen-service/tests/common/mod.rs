#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{Request, Response},
    Router,
};
use http_body_util::BodyExt;
use imagegen_service::config::{ImagegenConfig, ObservabilityConfig, TogetherConfig};
use imagegen_service::services::{ImageProvider, QuotaStore};
use imagegen_service::startup::{build_router, AppState, Application};
use secrecy::SecretString;
use service_core::config::{Config as CoreConfig, Environment};
use std::sync::Arc;

pub const GENERATE_PATH: &str = "/api/generateImages";

/// Router over the given provider and optional quota store.
pub fn test_router(provider: Arc<dyn ImageProvider>, quota: Option<Arc<dyn QuotaStore>>) -> Router {
    build_router(AppState::new(provider, quota))
}

/// JSON POST to the generation endpoint with extra headers.
pub fn generate_request(body: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(GENERATE_PATH)
        .header("Content-Type", "application/json");

    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response
        .into_body()
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("Response body is not JSON")
}

/// Configuration pointing the Together client at `provider_url`, without quota.
pub fn test_config(provider_url: &str) -> ImagegenConfig {
    ImagegenConfig {
        common: CoreConfig {
            port: 0,
            log_level: "error".to_string(),
        },
        environment: Environment::Dev,
        together: TogetherConfig {
            api_key: Some(SecretString::new("default-test-key".to_string())),
            base_url: provider_url.to_string(),
            timeout_secs: 5,
        },
        observability: ObservabilityConfig::default(),
        quota: None,
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
}

impl TestApp {
    pub async fn spawn(config: ImagegenConfig) -> Self {
        let app = Application::build(config, None)
            .await
            .expect("Failed to build test application");

        let port = app.http_port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp { address, port }
    }
}
