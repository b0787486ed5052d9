//! Token-bucket rate limiting for outgoing pulls. Lock-internal so callers
//! can share a limiter across threads without further coordination.

use std::sync::Mutex;
use std::time::Instant;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    /// Tokens added per second; also the bucket capacity.
    rate: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(rate_per_second: usize) -> Self {
        let rate = rate_per_second.max(1) as f64;
        Self {
            rate,
            bucket: Mutex::new(Bucket {
                tokens: rate,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes `cost` tokens if available.
    pub fn should_pass(&self, cost: usize) -> bool {
        let mut bucket = self.bucket.lock().expect("rate limiter lock poisoned");
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.rate);
        bucket.last_refill = now;
        let cost = cost as f64;
        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            true
        } else {
            false
        }
    }
}
