use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Retry hint returned with throttled responses, in seconds
const RETRY_AFTER_SECS: u64 = 1;

/// Sliding-window rate limiter: at most `max_requests` per token within a
/// trailing `window`. Entries older than the window are evicted lazily on
/// each check, so per-token state stays bounded by the request ceiling.
/// The key space grows with the (small, fixed) token set and is never pruned.
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `token`, or reject with a retry-after hint.
    /// Check-and-append is atomic under the map lock, keeping the sliding
    /// window accounting exact under concurrency.
    pub fn check(&self, token: &str) -> Result<(), u64> {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate window map poisoned");
        let queue = windows.entry(token.to_string()).or_default();

        while queue
            .front()
            .is_some_and(|t| now.duration_since(*t) > self.window)
        {
            queue.pop_front();
        }

        if queue.len() >= self.max_requests {
            return Err(RETRY_AFTER_SECS);
        }
        queue.push_back(now);
        Ok(())
    }
}
