// Request pacing for the extraction API.
//
// Each caller reserves the next free slot under the lock and then sleeps
// until that slot outside the lock, so concurrent extraction tasks queue up
// at evenly spaced instants instead of bursting.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Spaces requests at least `1 / requests_per_second` apart.
#[derive(Clone)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// A limiter allowing `requests_per_second` requests per second.
    /// Zero or negative rates disable pacing.
    pub fn new(requests_per_second: f64) -> Self {
        let interval = if requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            interval,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait for this caller's slot.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}
