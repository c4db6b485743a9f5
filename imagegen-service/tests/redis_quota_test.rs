//! Quota store against a live Redis.
//!
//! Skipped unless REDIS_URL is set.
//! Run with: REDIS_URL=redis://127.0.0.1:6379 cargo test -p imagegen-service --test redis_quota_test

use imagegen_service::config::QuotaConfig;
use imagegen_service::services::{QuotaStore, RedisQuota};
use std::time::{SystemTime, UNIX_EPOCH};

fn redis_url() -> Option<String> {
    match std::env::var("REDIS_URL") {
        Ok(url) if !url.is_empty() => Some(url),
        _ => {
            eprintln!("Skipping test: REDIS_URL is not set");
            None
        }
    }
}

/// Fresh key prefix so reruns never see earlier counters.
fn unique_prefix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("imagegen-test-{}", nanos)
}

async fn quota(limit: u32) -> Option<RedisQuota> {
    let url = redis_url()?;
    let mut config = QuotaConfig::new(url);
    config.limit = limit;
    config.window_seconds = 3600;
    config.prefix = unique_prefix();
    Some(RedisQuota::new(&config).await.expect("Failed to connect to Redis"))
}

#[tokio::test]
async fn allows_up_to_limit_then_rejects() {
    let Some(quota) = quota(3).await else { return };

    for expected_remaining in [2, 1, 0] {
        let decision = quota.check_and_consume("1.2.3.4").await.unwrap();
        assert!(decision.success);
        assert_eq!(decision.remaining, expected_remaining);
    }

    let decision = quota.check_and_consume("1.2.3.4").await.unwrap();
    assert!(!decision.success);
    assert_eq!(decision.limit, 3);
    assert_eq!(decision.remaining, 0);
    assert!(decision.reset_after.as_secs() <= 3600);
}

#[tokio::test]
async fn identifiers_have_independent_counters() {
    let Some(quota) = quota(1).await else { return };

    assert!(quota.check_and_consume("10.0.0.1").await.unwrap().success);
    assert!(quota.check_and_consume("10.0.0.2").await.unwrap().success);
    assert!(!quota.check_and_consume("10.0.0.1").await.unwrap().success);
}

#[tokio::test]
async fn concurrent_checks_never_overshoot() {
    let Some(quota) = quota(5).await else { return };

    let mut handles = Vec::new();
    for _ in 0..20 {
        let quota = quota.clone();
        handles.push(tokio::spawn(async move {
            quota.check_and_consume("9.9.9.9").await.unwrap().success
        }));
    }

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 5);
}

#[tokio::test]
async fn health_check_pings() {
    let Some(quota) = quota(1).await else { return };
    assert!(quota.health_check().await.is_ok());
}
