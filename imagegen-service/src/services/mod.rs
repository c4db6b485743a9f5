pub mod metrics;
pub mod providers;
pub mod quota;

pub use providers::{
    GeneratedImage, ImageGenerationParams, ImageProvider, MockImageProvider, ProviderError,
    TogetherProvider,
};
pub use quota::{MockQuota, QuotaDecision, QuotaError, QuotaStore, RedisQuota};
