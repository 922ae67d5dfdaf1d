//! # Rate Limiting and Backoff
//!
//! Computes how long a key waits before it is re-admitted to the work queue after a
//! failed reconciliation.
//!
//! Two limiters are combined, and the longer of their delays wins:
//!
//! - **Per-item exponential backoff**: `base * 2^failures`, capped at a ceiling. The
//!   failure count is tracked per key and is what the work queue reports as the
//!   key's requeue count.
//! - **Overall token bucket**: bounds the aggregate retry rate across all keys
//!   (10 qps with a burst of 100 by default).
//!
//! ## Usage
//!
//! ```rust
//! use ingress_operator::controller::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let backoff = ExponentialBackoff::new(Duration::from_millis(5), Duration::from_secs(1000));
//! assert_eq!(backoff.delay_for(0), Duration::from_millis(5));
//! assert_eq!(backoff.delay_for(1), Duration::from_millis(10));
//! assert_eq!(backoff.delay_for(2), Duration::from_millis(20));
//! assert_eq!(backoff.delay_for(40), Duration::from_secs(1000));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::config::ControllerConfig;

/// Decides the re-admission delay of retried items
///
/// Implementations live inside the work queue's lock, so methods take `&mut self`
/// and need no synchronization of their own.
pub trait RateLimiter<T>: Send + fmt::Debug {
    /// Delay before `item` may be re-admitted. Records one more failure for `item`.
    fn when(&mut self, item: &T) -> Duration;

    /// Number of failures recorded for `item` since it was last forgotten
    fn num_requeues(&self, item: &T) -> u32;

    /// Clear the failure history of `item`
    fn forget(&mut self, item: &T);
}

/// Exponential backoff calculator
///
/// Stateless: the caller supplies the number of previous failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Delay for the first failure
    base: Duration,
    /// Ceiling for every delay
    max: Duration,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay for an item that has already failed `failures` times
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 1u128.checked_shl(failures).unwrap_or(u128::MAX);
        let nanos = self
            .base
            .as_nanos()
            .saturating_mul(factor)
            .min(self.max.as_nanos());
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Per-item exponential failure limiter
#[derive(Debug)]
pub struct ItemExponentialRateLimiter<T> {
    backoff: ExponentialBackoff,
    failures: HashMap<T, u32>,
}

impl<T> ItemExponentialRateLimiter<T> {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            backoff: ExponentialBackoff::new(base, max),
            failures: HashMap::new(),
        }
    }
}

impl<T> RateLimiter<T> for ItemExponentialRateLimiter<T>
where
    T: Eq + Hash + Clone + Send + fmt::Debug,
{
    fn when(&mut self, item: &T) -> Duration {
        let failures = self.failures.entry(item.clone()).or_insert(0);
        let delay = self.backoff.delay_for(*failures);
        *failures = failures.saturating_add(1);
        delay
    }

    fn num_requeues(&self, item: &T) -> u32 {
        self.failures.get(item).copied().unwrap_or(0)
    }

    fn forget(&mut self, item: &T) {
        self.failures.remove(item);
    }
}

/// Token bucket shared by all items
///
/// Every `reserve` takes one token; when the bucket is empty the caller is told how
/// long it must wait for its token to be refilled.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    qps: f64,
    burst: f64,
    tokens: f64,
    last: Instant,
}

impl TokenBucket {
    /// A full bucket of `burst` tokens refilled at `qps` tokens per second.
    /// A `qps` of zero disables limiting.
    #[must_use]
    pub fn new(qps: u32, burst: u32) -> Self {
        Self {
            qps: f64::from(qps),
            burst: f64::from(burst.max(1)),
            tokens: f64::from(burst.max(1)),
            last: Instant::now(),
        }
    }

    /// Reserve one token at `now` and return the wait before it may be used
    pub fn reserve(&mut self, now: Instant) -> Duration {
        if self.qps <= 0.0 {
            return Duration::ZERO;
        }
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = self.last.max(now);
        self.tokens = (self.tokens + elapsed * self.qps).min(self.burst) - 1.0;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.qps)
        }
    }
}

/// Limiter that never counts failures against an item
#[derive(Debug, Clone)]
pub struct BucketRateLimiter {
    bucket: TokenBucket,
}

impl BucketRateLimiter {
    #[must_use]
    pub fn new(qps: u32, burst: u32) -> Self {
        Self {
            bucket: TokenBucket::new(qps, burst),
        }
    }
}

impl<T> RateLimiter<T> for BucketRateLimiter {
    fn when(&mut self, _item: &T) -> Duration {
        self.bucket.reserve(Instant::now())
    }

    fn num_requeues(&self, _item: &T) -> u32 {
        0
    }

    fn forget(&mut self, _item: &T) {}
}

/// The controller's default limiter: the longer of per-item backoff and the overall bucket
#[derive(Debug)]
pub struct ControllerRateLimiter<T> {
    items: ItemExponentialRateLimiter<T>,
    bucket: BucketRateLimiter,
}

impl<T> ControllerRateLimiter<T> {
    #[must_use]
    pub fn new(items: ItemExponentialRateLimiter<T>, bucket: BucketRateLimiter) -> Self {
        Self { items, bucket }
    }

    /// Build the limiter from controller configuration
    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(
            ItemExponentialRateLimiter::new(
                config.backoff_base_duration(),
                config.backoff_max_duration(),
            ),
            BucketRateLimiter::new(config.rate_limit_qps, config.rate_limit_burst),
        )
    }
}

impl<T> RateLimiter<T> for ControllerRateLimiter<T>
where
    T: Eq + Hash + Clone + Send + fmt::Debug,
{
    fn when(&mut self, item: &T) -> Duration {
        let item_delay = self.items.when(item);
        let bucket_delay = RateLimiter::<T>::when(&mut self.bucket, item);
        item_delay.max(bucket_delay)
    }

    fn num_requeues(&self, item: &T) -> u32 {
        self.items.num_requeues(item)
    }

    fn forget(&mut self, item: &T) {
        self.items.forget(item);
    }
}
