//! Per-sender token bucket.
//!
//! Every inbound chat message costs one token. Buckets refill one token per
//! `refill_interval` up to `max_tokens`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use coursedesk_config::ChannelConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_tokens: u32,
    pub refill_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::from(&ChannelConfig::default())
    }
}

impl From<&ChannelConfig> for RateLimitConfig {
    fn from(config: &ChannelConfig) -> Self {
        Self {
            max_tokens: config.rate_limit_max_tokens.max(1),
            refill_interval: Duration::from_millis(config.rate_limit_refill_ms.max(1)),
        }
    }
}

struct Bucket {
    tokens: u32,
    /// Start of the refill period currently accruing.
    since: Instant,
}

impl Bucket {
    /// Credit whole refill periods elapsed by `now`, keeping the partial one.
    fn refill(&mut self, now: Instant, config: &RateLimitConfig) {
        let interval = config.refill_interval.as_millis().max(1);
        let periods = now.saturating_duration_since(self.since).as_millis() / interval;
        if periods == 0 {
            return;
        }
        let credited = u32::try_from(periods).unwrap_or(u32::MAX);
        self.tokens = self.tokens.saturating_add(credited).min(config.max_tokens);
        if self.tokens == config.max_tokens {
            self.since = now;
        } else {
            // Whole periods only; `credited` is below `max_tokens` here.
            self.since += config.refill_interval * credited;
        }
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: HashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: HashMap::new(),
        }
    }

    /// Take one token for `sender`. `false` means the message must be dropped.
    pub fn check(&mut self, sender: &str) -> bool {
        self.check_at(sender, Instant::now())
    }

    fn check_at(&mut self, sender: &str, now: Instant) -> bool {
        let config = &self.config;
        let bucket = self
            .buckets
            .entry(sender.to_string())
            .or_insert_with(|| Bucket {
                tokens: config.max_tokens,
                since: now,
            });
        bucket.refill(now, config);

        if bucket.tokens == 0 {
            return false;
        }
        bucket.tokens -= 1;
        true
    }

    /// Tokens left for `sender`, not counting refills since its last message.
    pub fn remaining(&self, sender: &str) -> u32 {
        self.buckets
            .get(sender)
            .map_or(self.config.max_tokens, |b| b.tokens)
    }

    /// Forget senders whose bucket has refilled completely.
    pub fn cleanup(&mut self) -> usize {
        self.cleanup_at(Instant::now())
    }

    fn cleanup_at(&mut self, now: Instant) -> usize {
        let before = self.buckets.len();
        let config = &self.config;
        self.buckets.retain(|_, bucket| {
            bucket.refill(now, config);
            bucket.tokens < config.max_tokens
        });
        before - self.buckets.len()
    }

    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_tokens: u32, refill_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_tokens,
            refill_interval: Duration::from_millis(refill_ms),
        })
    }

    #[test]
    fn test_blocks_after_bucket_is_empty() {
        let mut limiter = limiter(3, 60_000);
        assert!(limiter.check("u1"));
        assert!(limiter.check("u1"));
        assert!(limiter.check("u1"));
        assert!(!limiter.check("u1"));
    }

    #[test]
    fn test_senders_are_independent() {
        let mut limiter = limiter(1, 60_000);
        assert!(limiter.check("u1"));
        assert!(!limiter.check("u1"));
        assert!(limiter.check("u2"));
    }

    #[test]
    fn test_refill_keeps_partial_period() {
        let mut limiter = limiter(2, 1000);
        let t0 = Instant::now();
        assert!(limiter.check_at("u1", t0));
        assert!(limiter.check_at("u1", t0));
        assert!(!limiter.check_at("u1", t0 + Duration::from_millis(900)));

        // One period has passed: one token back.
        assert!(limiter.check_at("u1", t0 + Duration::from_millis(1500)));
        assert!(!limiter.check_at("u1", t0 + Duration::from_millis(1600)));
        // The next period ends at 2000 ms, not 2500 ms.
        assert!(limiter.check_at("u1", t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn test_refill_caps_at_max() {
        let mut limiter = limiter(2, 10);
        let t0 = Instant::now();
        assert!(limiter.check_at("u1", t0));
        assert!(limiter.check_at("u1", t0 + Duration::from_secs(60)));
        assert_eq!(limiter.remaining("u1"), 1);
    }

    #[test]
    fn test_cleanup_drops_refilled_buckets() {
        let mut limiter = limiter(5, 1000);
        let t0 = Instant::now();
        limiter.check_at("u1", t0);
        limiter.check_at("u2", t0);
        limiter.check_at("u2", t0);

        assert_eq!(limiter.cleanup_at(t0), 0);
        assert_eq!(limiter.cleanup_at(t0 + Duration::from_millis(1000)), 1);
        assert_eq!(limiter.tracked(), 1);
        assert_eq!(limiter.cleanup_at(t0 + Duration::from_millis(2000)), 1);
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_config_from_channel_section() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_tokens, 20);
        assert_eq!(config.refill_interval, Duration::from_secs(3));
    }
}
