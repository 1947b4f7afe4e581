use async_trait::async_trait;
use banter_core::{Post, PostId};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Emoji occasionally appended to replies so repeated template text does not
/// read identically.
pub(crate) const REPLY_EMOJI: &[&str] = &["🚀", "💎", "🐸", "🌙", "💰", "📈", "🔥", "⚡"];

/// Every random draw the scheduler makes goes through this trait, so test
/// suites can script the gate, template, emoji, and delay decisions.
pub trait RandomSource: Send + Sync {
    /// Uniform draw in [0, 1).
    fn unit(&self) -> f64;
    /// Uniform integer in [lo, hi], inclusive on both ends.
    fn range(&self, lo: u32, hi: u32) -> u32;
    /// Uniform index in [0, len).
    fn index(&self, len: usize) -> usize;
}

pub struct FastrandSource;

impl RandomSource for FastrandSource {
    fn unit(&self) -> f64 {
        fastrand::f64()
    }

    fn range(&self, lo: u32, hi: u32) -> u32 {
        fastrand::u32(lo..=hi)
    }

    fn index(&self, len: usize) -> usize {
        fastrand::usize(..len)
    }
}

/// Time and sleeping, injectable so cycles run without wall-clock waits in
/// tests.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Cursor filter: anything at or below the stored cursor was already seen.
pub(crate) fn already_processed(post: &Post, cursor: Option<PostId>) -> bool {
    matches!(cursor, Some(cursor) if post.id <= cursor)
}

/// Freshness filter: replies only go to posts younger than the window.
pub(crate) fn is_stale(post: &Post, now: DateTime<Utc>, freshness_window: Duration) -> bool {
    match chrono::Duration::from_std(freshness_window) {
        Ok(window) => now.signed_duration_since(post.created_at) > window,
        Err(_) => false,
    }
}

pub(crate) fn randomize_reply(
    text: &str,
    emoji_probability: f64,
    rng: &dyn RandomSource,
) -> String {
    if rng.unit() < emoji_probability {
        let emoji = REPLY_EMOJI[rng.index(REPLY_EMOJI.len())];
        format!("{} {}", text, emoji)
    } else {
        text.to_string()
    }
}

/// Uniform pacing delay in whole minutes, inclusive on both bounds.
pub(crate) fn pacing_delay(min_minutes: u32, max_minutes: u32, rng: &dyn RandomSource) -> Duration {
    let minutes = rng.range(min_minutes, max_minutes);
    Duration::from_secs(u64::from(minutes) * 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use banter_core::PostMetrics;

    /// Fixed-value source for exercising the pure helpers.
    struct FixedRandom {
        unit: f64,
        range: u32,
        index: usize,
    }

    impl RandomSource for FixedRandom {
        fn unit(&self) -> f64 {
            self.unit
        }

        fn range(&self, lo: u32, hi: u32) -> u32 {
            self.range.clamp(lo, hi)
        }

        fn index(&self, len: usize) -> usize {
            self.index.min(len - 1)
        }
    }

    fn post(id: i64, created_at: DateTime<Utc>) -> Post {
        Post {
            id: PostId(id),
            text: "gm".to_string(),
            created_at,
            metrics: PostMetrics::default(),
        }
    }

    #[test]
    fn test_cursor_filter() {
        let now = Utc::now();
        assert!(already_processed(&post(100, now), Some(PostId(100))));
        assert!(already_processed(&post(99, now), Some(PostId(100))));
        assert!(!already_processed(&post(101, now), Some(PostId(100))));
        assert!(!already_processed(&post(1, now), None));
    }

    #[test]
    fn test_freshness_filter() {
        let now = Utc::now();
        let window = Duration::from_secs(3600);

        let recent = post(1, now - chrono::Duration::minutes(59));
        assert!(!is_stale(&recent, now, window));

        let old = post(2, now - chrono::Duration::minutes(61));
        assert!(is_stale(&old, now, window));

        // Posts dated in the future are never stale.
        let future = post(3, now + chrono::Duration::minutes(5));
        assert!(!is_stale(&future, now, window));
    }

    #[test]
    fn test_reply_randomization() {
        let with_emoji = FixedRandom {
            unit: 0.1,
            range: 0,
            index: 0,
        };
        assert_eq!(
            randomize_reply("nice one", 0.3, &with_emoji),
            format!("nice one {}", REPLY_EMOJI[0])
        );

        let without_emoji = FixedRandom {
            unit: 0.9,
            range: 0,
            index: 0,
        };
        assert_eq!(randomize_reply("nice one", 0.3, &without_emoji), "nice one");
    }

    #[test]
    fn test_pacing_delay_bounds() {
        let low = FixedRandom {
            unit: 0.0,
            range: 0,
            index: 0,
        };
        assert_eq!(pacing_delay(30, 180, &low), Duration::from_secs(30 * 60));

        let high = FixedRandom {
            unit: 0.0,
            range: 500,
            index: 0,
        };
        assert_eq!(pacing_delay(30, 180, &high), Duration::from_secs(180 * 60));

        // Degenerate range still works.
        assert_eq!(pacing_delay(45, 45, &low), Duration::from_secs(45 * 60));
    }
}
