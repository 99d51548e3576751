//! Token-bucket rate limiter.
//!
//! A bucket of `capacity` tokens refills at `capacity / window` tokens per
//! second. `acquire` takes one token, sleeping until one is available. The
//! check-and-decrement runs under a lock that is never held across the sleep,
//! so concurrent acquirers cannot both take the last token.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    capacity: f64,
    window: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `max_requests` per `window`. Both must be non-zero; zero values are raised to one.
    pub fn new(name: &'static str, max_requests: u32, window: Duration) -> Self {
        let capacity = f64::from(max_requests.max(1));
        let window = if window.is_zero() {
            Duration::from_secs(1)
        } else {
            window
        };
        Self {
            name,
            capacity,
            window,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Tokens replenished per second.
    pub fn rate(&self) -> f64 {
        self.capacity / self.window.as_secs_f64()
    }

    /// Wait until a token is available and consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.try_take() {
                Ok(()) => return,
                Err(wait) => wait,
            };
            debug!(limiter = self.name, wait_ms = wait.as_millis() as u64, "rate limited, waiting for a token");
            tokio::time::sleep(wait).await;
        }
    }

    /// Run `fut` once a token has been acquired.
    pub async fn throttle<F: Future>(&self, fut: F) -> F::Output {
        self.acquire().await;
        fut.await
    }

    /// Tokens currently available after refilling.
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut bucket);
        bucket.tokens
    }

    /// Take a token, or report how long until one will be available.
    fn try_take(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }
        let missing = 1.0 - bucket.tokens;
        let wait = Duration::from_secs_f64(missing / self.rate());
        Err(wait.max(Duration::from_millis(1)))
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate()).min(self.capacity);
        bucket.last_refill = now;
    }
}
