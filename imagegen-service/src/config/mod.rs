use secrecy::SecretString;
use service_core::config::{self as core_config, Environment};
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

/// Direct Together AI endpoint.
pub const TOGETHER_API_BASE: &str = "https://api.together.xyz/v1";

/// Helicone gateway in front of Together AI, used when an observability key is set.
pub const HELICONE_TOGETHER_BASE: &str = "https://together.helicone.ai/v1";

const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;

/// 100 generations per identifier per day.
const DEFAULT_QUOTA_LIMIT: u32 = 100;
const DEFAULT_QUOTA_WINDOW_SECONDS: u64 = 24 * 60 * 60;
const DEFAULT_QUOTA_PREFIX: &str = "imagegen";

#[derive(Debug, Clone)]
pub struct ImagegenConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub together: TogetherConfig,
    pub observability: ObservabilityConfig,
    /// `None` disables rate limiting entirely.
    pub quota: Option<QuotaConfig>,
}

#[derive(Debug, Clone)]
pub struct TogetherConfig {
    /// Process-wide default credential. Requests may bring their own.
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// When set, provider calls are routed through the Helicone gateway.
    pub helicone_api_key: Option<SecretString>,
    pub helicone_base_url: String,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub redis_url: String,
    pub limit: u32,
    pub window_seconds: u64,
    pub prefix: String,
}

impl Default for TogetherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: TOGETHER_API_BASE.to_string(),
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            helicone_api_key: None,
            helicone_base_url: HELICONE_TOGETHER_BASE.to_string(),
            otlp_endpoint: None,
        }
    }
}

impl QuotaConfig {
    pub fn new(redis_url: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            limit: DEFAULT_QUOTA_LIMIT,
            window_seconds: DEFAULT_QUOTA_WINDOW_SECONDS,
            prefix: DEFAULT_QUOTA_PREFIX.to_string(),
        }
    }
}

impl ImagegenConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let environment = Environment::current()?;
        let is_prod = environment.is_prod();

        let api_key = if is_prod {
            Some(get_env("TOGETHER_API_KEY", None, is_prod)?)
        } else {
            get_optional_env("TOGETHER_API_KEY")
        };

        let quota = match get_optional_env("REDIS_URL") {
            Some(redis_url) => Some(QuotaConfig {
                redis_url,
                limit: parse_env("QUOTA_LIMIT", DEFAULT_QUOTA_LIMIT)?,
                window_seconds: parse_env("QUOTA_WINDOW_SECONDS", DEFAULT_QUOTA_WINDOW_SECONDS)?,
                prefix: get_env("QUOTA_PREFIX", Some(DEFAULT_QUOTA_PREFIX), false)?,
            }),
            None => None,
        };

        if let Some(quota) = &quota {
            if quota.limit == 0 || quota.window_seconds == 0 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "QUOTA_LIMIT and QUOTA_WINDOW_SECONDS must be greater than zero"
                )));
            }
        }

        Ok(ImagegenConfig {
            common: common_config,
            environment,
            together: TogetherConfig {
                api_key: api_key.map(SecretString::new),
                base_url: get_env("TOGETHER_BASE_URL", Some(TOGETHER_API_BASE), false)?,
                timeout_secs: parse_env("PROVIDER_TIMEOUT_SECS", DEFAULT_PROVIDER_TIMEOUT_SECS)?,
            },
            observability: ObservabilityConfig {
                helicone_api_key: get_optional_env("HELICONE_API_KEY").map(SecretString::new),
                helicone_base_url: get_env("HELICONE_BASE_URL", Some(HELICONE_TOGETHER_BASE), false)?,
                otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            },
            quota,
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Optional features are switched off by leaving the variable unset or empty.
fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional_env(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
        }),
        None => Ok(default),
    }
}
