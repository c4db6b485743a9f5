//! HTTP handlers for the image generation service.

pub mod error;
pub mod generate;
pub mod health;

pub use error::{GenerateError, QUOTA_EXHAUSTED_MESSAGE, QUOTA_UNAVAILABLE_MESSAGE};
pub use generate::{generate_images, GenerateImageRequest};
pub use health::{health_check, metrics_endpoint, readiness_check};
