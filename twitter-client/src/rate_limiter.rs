use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    /// User-timeline reads are capped at 900 requests per 15-minute window
    /// with app auth; bursts are kept small so the budget spreads across
    /// the whole window.
    pub fn twitter_v2() -> Self {
        Self {
            max_requests: 900,
            time_window: Duration::from_secs(15 * 60),
            burst_allowance: 10,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket combined with a concurrency cap. `acquire_permit` blocks
/// until a token is available, so callers never see a rate-limit error from
/// this side of the connection.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<BucketState>,
    semaphore: Arc<Semaphore>,
    capacity: f64,
    refill_rate: f64,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            semaphore: Arc::new(Semaphore::new(config.burst_allowance as usize)),
            capacity,
            refill_rate,
            config,
        }
    }

    pub async fn acquire_permit(&self) -> RateLimitPermit {
        let start_time = Instant::now();
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("Semaphore should not be closed");

        loop {
            let wait_time = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64(
                        (1.0 - state.tokens) / self.refill_rate,
                    ))
                }
            };
            match wait_time {
                None => break,
                Some(wait) => {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait);
                    sleep(wait).await;
                }
            }
        }

        RateLimitPermit {
            _permit: permit,
            queue_wait_time: start_time.elapsed(),
        }
    }

    pub async fn status(&self) -> RateLimitStatus {
        let mut state = self.state.lock().await;
        self.refill(&mut state);
        RateLimitStatus {
            available_tokens: state.tokens as u32,
            max_tokens: self.config.burst_allowance,
            available_permits: self.semaphore.available_permits(),
            requests_per_window: self.config.max_requests,
            window: self.config.time_window,
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }
}

#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
    pub queue_wait_time: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub max_tokens: u32,
    pub available_permits: usize,
    pub requests_per_window: u32,
    pub window: Duration,
}

impl RateLimitStatus {
    pub fn utilization_percentage(&self) -> f64 {
        let used = self.max_tokens.saturating_sub(self.available_tokens);
        (used as f64 / self.max_tokens as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_exhaustion_and_refill() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 60, // one token per second
            time_window: Duration::from_secs(60),
            burst_allowance: 2,
        });

        // Burst tokens drain without waiting.
        let _a = limiter.acquire_permit().await;
        let _b = limiter.acquire_permit().await;
        let status = limiter.status().await;
        assert_eq!(status.available_tokens, 0);

        // The third acquisition must wait for a refill.
        drop(_a);
        drop(_b);
        let before = Instant::now();
        let _c = limiter.acquire_permit().await;
        assert!(before.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_status_reflects_configuration() {
        let limiter = RateLimiter::new(RateLimitConfig::twitter_v2());
        let status = limiter.status().await;
        assert_eq!(status.max_tokens, 10);
        assert_eq!(status.requests_per_window, 900);
        assert_eq!(status.window, Duration::from_secs(900));
        assert!(status.utilization_percentage() <= 100.0);
    }

    #[tokio::test]
    async fn test_permit_tracks_queue_wait() {
        let limiter = RateLimiter::new(RateLimitConfig::twitter_v2());
        let permit = limiter.acquire_permit().await;
        assert!(permit.queue_wait_time < Duration::from_secs(1));
    }
}
