use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::retry::RetryConfig;
use crate::TwitterClient;
use banter_core::PlatformConfig;

fn create_test_config() -> PlatformConfig {
    PlatformConfig {
        bearer_token: "test_bearer_token".to_string(),
        user_agent: "banter-test/1.0".to_string(),
    }
}

#[tokio::test]
async fn test_client_creation() {
    let client = TwitterClient::new(&create_test_config());

    let status = client.rate_limit_status().await;
    assert!(status.available_tokens > 0);
    assert_eq!(status.requests_per_window, 900);

    let metrics = client.api_metrics().await;
    assert_eq!(metrics.total_requests, 0);
}

#[test]
fn test_twitter_retry_profile() {
    let config = RetryConfig::twitter();
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.base_delay_ms, 2000);
    assert_eq!(config.max_delay_ms, 60000);
    assert!(config.jitter_factor > 0.0);
}

#[test]
fn test_rate_limiter_integration() {
    let limiter = RateLimiter::new(RateLimitConfig::twitter_v2());

    let _first = tokio_test::block_on(limiter.acquire_permit());
    let _second = tokio_test::block_on(limiter.acquire_permit());

    let status = tokio_test::block_on(limiter.status());
    assert!(status.available_tokens < status.max_tokens);
    assert!(status.available_permits <= status.max_tokens as usize);
}
