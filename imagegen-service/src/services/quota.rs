//! Shared per-identifier quota backed by an external counter store.
//!
//! The policy is a fixed window: each identifier may consume `limit` calls per
//! `window`, counted in a key that is specific to the current window index.
//! Atomicity of the counter is left to the store.

use crate::config::QuotaConfig;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client, Script};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Increment the window counter and arm its expiry on the first hit.
const FIXED_WINDOW_SCRIPT: &str = r#"
local count = redis.call("INCR", KEYS[1])
if count == 1 then
    redis.call("PEXPIRE", KEYS[1], ARGV[1])
end
return count
"#;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("Quota store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("Quota store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of consuming one unit of quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_after: Duration,
}

#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Count one call against `identifier` and report whether it was allowed.
    async fn check_and_consume(&self, identifier: &str) -> Result<QuotaDecision, QuotaError>;

    async fn health_check(&self) -> Result<(), QuotaError>;
}

/// Fixed-window arithmetic shared by every store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWindow {
    pub limit: u32,
    pub window: Duration,
}

impl FixedWindow {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window: window.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(config: &QuotaConfig) -> Self {
        Self::new(config.limit, Duration::from_secs(config.window_seconds))
    }

    fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }

    pub fn window_index(&self, now_ms: u64) -> u64 {
        now_ms / self.window_ms()
    }

    /// Decide for the `count`-th call (1-based) made at `now_ms`.
    pub fn decide(&self, count: u64, now_ms: u64) -> QuotaDecision {
        let limit = u64::from(self.limit);
        let window_end = (self.window_index(now_ms) + 1) * self.window_ms();

        QuotaDecision {
            success: count <= limit,
            limit: self.limit,
            remaining: limit.saturating_sub(count) as u32,
            reset_after: Duration::from_millis(window_end.saturating_sub(now_ms)),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Redis-backed fixed-window quota.
#[derive(Clone)]
pub struct RedisQuota {
    manager: ConnectionManager,
    policy: FixedWindow,
    prefix: String,
    script: Arc<Script>,
}

impl RedisQuota {
    pub async fn new(config: &QuotaConfig) -> Result<Self, QuotaError> {
        tracing::info!(
            limit = config.limit,
            window_seconds = config.window_seconds,
            "Connecting to Redis quota store"
        );
        let client = Client::open(config.redis_url.clone())?;

        // Use ConnectionManager for automatic reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            QuotaError::Unavailable(e.to_string())
        })?;

        tracing::info!("Successfully connected to Redis quota store");

        Ok(Self {
            manager,
            policy: FixedWindow::from_config(config),
            prefix: config.prefix.clone(),
            script: Arc::new(Script::new(FIXED_WINDOW_SCRIPT)),
        })
    }

    fn key(&self, identifier: &str, now_ms: u64) -> String {
        window_key(&self.prefix, identifier, self.policy.window_index(now_ms))
    }
}

fn window_key(prefix: &str, identifier: &str, window_index: u64) -> String {
    format!("{}:{}:{}", prefix, identifier, window_index)
}

#[async_trait]
impl QuotaStore for RedisQuota {
    async fn check_and_consume(&self, identifier: &str) -> Result<QuotaDecision, QuotaError> {
        let mut conn = self.manager.clone();
        let now = now_ms();
        let key = self.key(identifier, now);

        let mut invocation = self.script.key(&key);
        invocation.arg(self.policy.window_ms());
        let count: u64 = invocation.invoke_async(&mut conn).await?;

        Ok(self.policy.decide(count, now))
    }

    async fn health_check(&self) -> Result<(), QuotaError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// In-memory quota with the same policy, for tests.
pub struct MockQuota {
    policy: FixedWindow,
    counters: Mutex<HashMap<String, u64>>,
    checked: Mutex<Vec<String>>,
    available: bool,
}

impl MockQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            policy: FixedWindow::new(limit, Duration::from_secs(24 * 60 * 60)),
            counters: Mutex::new(HashMap::new()),
            checked: Mutex::new(Vec::new()),
            available: true,
        }
    }

    /// A store whose every call fails.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(1)
        }
    }

    /// Identifiers checked so far, in order.
    pub fn checked_identifiers(&self) -> Vec<String> {
        self.checked
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn check_count(&self) -> usize {
        self.checked.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl QuotaStore for MockQuota {
    async fn check_and_consume(&self, identifier: &str) -> Result<QuotaDecision, QuotaError> {
        self.checked
            .lock()
            .map_err(|e| QuotaError::Unavailable(format!("Mock quota mutex poisoned: {}", e)))?
            .push(identifier.to_string());

        if !self.available {
            return Err(QuotaError::Unavailable("mock store is down".to_string()));
        }

        let now = now_ms();
        let key = window_key("mock", identifier, self.policy.window_index(now));
        let count = {
            let mut counters = self
                .counters
                .lock()
                .map_err(|e| QuotaError::Unavailable(format!("Mock quota mutex poisoned: {}", e)))?;
            let count = counters.entry(key).or_insert(0);
            *count += 1;
            *count
        };

        Ok(self.policy.decide(count, now))
    }

    async fn health_check(&self) -> Result<(), QuotaError> {
        if self.available {
            Ok(())
        } else {
            Err(QuotaError::Unavailable("mock store is down".to_string()))
        }
    }
}
