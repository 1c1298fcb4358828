//! Login rate limiter
//!
//! A single token bucket shared by every login attempt, regardless of who
//! is attempting. The bucket refills continuously over time; it is never
//! cleared in bulk.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Configuration for the rate limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Bucket capacity (maximum burst of attempts)
    pub burst: u32,

    /// Time to refill one token
    pub refill_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 5,
            refill_interval: Duration::from_secs(12),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    /// Whole tokens currently available
    tokens: u32,

    /// Start of the refill interval currently in progress
    last_refill: Instant,
}

/// Process-wide login rate limiter
///
/// Thread-safe; the check-and-take is done under a single lock so concurrent
/// callers can never jointly overdraw the bucket.
#[derive(Debug)]
pub struct LoginRateLimiter {
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
}

impl LoginRateLimiter {
    /// Create a new rate limiter with a full bucket
    pub fn new(config: RateLimitConfig) -> Self {
        let bucket = Bucket {
            tokens: config.burst,
            last_refill: Instant::now(),
        };
        Self {
            config,
            bucket: Mutex::new(bucket),
        }
    }

    /// Take one attempt from the bucket
    ///
    /// Returns `false` without blocking when the bucket is empty.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&self, now: Instant) -> bool {
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut bucket, now);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Number of whole attempts currently available
    #[cfg(test)]
    fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let burst = self.config.burst;
        let interval = self.config.refill_interval;

        // A full bucket does not bank time
        if bucket.tokens >= burst || interval.is_zero() {
            bucket.tokens = burst;
            bucket.last_refill = bucket.last_refill.max(now);
            return;
        }

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let intervals = elapsed.as_nanos() / interval.as_nanos();
        if intervals == 0 {
            return;
        }

        let refilled = u128::from(bucket.tokens) + intervals;
        if refilled >= u128::from(burst) {
            bucket.tokens = burst;
            bucket.last_refill = now;
        } else {
            // intervals < burst here, so it fits in u32
            bucket.tokens = refilled as u32;
            bucket.last_refill += interval * intervals as u32;
        }
    }
}
