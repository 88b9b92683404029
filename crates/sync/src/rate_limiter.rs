//! Token bucket limiting outbound vertex requests.
//!
//! Driven by state machine time rather than the wall clock, so the same
//! inputs always produce the same decisions.

use std::time::Duration;

/// Token bucket refilled continuously at a fixed rate.
#[derive(Debug, Clone)]
pub struct RequestRateLimiter {
    /// Current number of tokens available.
    tokens: f64,
    /// Maximum tokens (bucket capacity).
    capacity: f64,
    /// Tokens added per second.
    refill_rate: f64,
    /// Time of the last refill.
    last_update: Duration,
}

impl RequestRateLimiter {
    /// A full bucket of `burst` tokens refilled at `per_sec`.
    pub fn new(per_sec: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            tokens: capacity,
            capacity,
            refill_rate: per_sec.max(0.0),
            last_update: Duration::ZERO,
        }
    }

    /// Try to consume one token at time `now`.
    pub fn try_acquire(&mut self, now: Duration) -> bool {
        let elapsed = now.saturating_sub(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_update = self.last_update.max(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_limit() {
        let mut limiter = RequestRateLimiter::new(10.0, 3);
        let now = Duration::ZERO;
        assert!(limiter.try_acquire(now));
        assert!(limiter.try_acquire(now));
        assert!(limiter.try_acquire(now));
        assert!(!limiter.try_acquire(now));
    }

    #[test]
    fn test_refills_over_time() {
        let mut limiter = RequestRateLimiter::new(10.0, 1);
        assert!(limiter.try_acquire(Duration::ZERO));
        assert!(!limiter.try_acquire(Duration::from_millis(50)));
        assert!(limiter.try_acquire(Duration::from_millis(150)));
    }

    #[test]
    fn test_time_going_backwards_does_not_refill() {
        let mut limiter = RequestRateLimiter::new(10.0, 1);
        assert!(limiter.try_acquire(Duration::from_secs(5)));
        assert!(!limiter.try_acquire(Duration::from_secs(1)));
    }
}
