use banter_core::{CoreError, PlatformApiError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Retry config tuned for the platform API
    pub fn twitter() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2, // 20% jitter to prevent thundering herd
        }
    }
}

/// Retry strategy based on error type
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry after a platform-specified delay
    RetryWithDelay(Duration),
    /// Don't retry (permanent failure)
    NoRetry,
}

pub fn retry_strategy(error: &CoreError) -> RetryStrategy {
    match error {
        CoreError::PlatformApi(platform_error) => match platform_error {
            PlatformApiError::RateLimitExceeded { retry_after } => {
                RetryStrategy::RetryWithDelay(Duration::from_secs(*retry_after))
            }
            PlatformApiError::ServerError { .. } => RetryStrategy::Retry,
            PlatformApiError::RequestTimeout => RetryStrategy::Retry,
            PlatformApiError::InvalidResponse { .. } => RetryStrategy::Retry,
            // Auth, permission, and publish rejections are permanent
            PlatformApiError::AuthenticationFailed { .. } => RetryStrategy::NoRetry,
            PlatformApiError::InvalidToken => RetryStrategy::NoRetry,
            PlatformApiError::Forbidden { .. } => RetryStrategy::NoRetry,
            PlatformApiError::UserNotFound { .. } => RetryStrategy::NoRetry,
            PlatformApiError::PublishRejected { .. } => RetryStrategy::NoRetry,
        },
        CoreError::Network(reqwest_error) => {
            if reqwest_error.is_timeout() || reqwest_error.is_connect() {
                RetryStrategy::Retry
            } else {
                RetryStrategy::NoRetry
            }
        }
        _ => RetryStrategy::NoRetry,
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let multiplier = config.backoff_multiplier.powi(attempt as i32);
    let delay_ms = ((config.base_delay_ms as f64 * multiplier) as u64).min(config.max_delay_ms);

    let jitter_range = (delay_ms as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);

    Duration::from_millis((delay_ms + jitter).min(config.max_delay_ms))
}

/// Run a fetch-style operation with retries. Publish operations must not go
/// through here: a failed reply is recorded, not repeated.
pub async fn with_retries<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut call: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                attempt += 1;
                if attempt >= config.max_attempts {
                    return Err(error);
                }
                let delay = match retry_strategy(&error) {
                    RetryStrategy::NoRetry => return Err(error),
                    RetryStrategy::RetryWithDelay(delay) => delay,
                    RetryStrategy::Retry => backoff_delay(attempt - 1, config),
                };
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    operation, attempt, config.max_attempts, delay, error
                );
                sleep(delay).await;
                debug!("Retrying {}", operation);
            }
        }
    }
}
