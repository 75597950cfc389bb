//! Minimum spacing between outbound requests.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Grants request slots at least `interval` apart, in the order they were
/// requested. The first slot is free.
pub struct RateLimiter {
    interval: Duration,
    next_free: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_free: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the caller may issue its request.
    pub async fn await_slot(&self) {
        let slot = {
            // A panic while holding this lock cannot leave the instant half
            // written, so a poisoned guard is still usable.
            let mut next_free = self
                .next_free
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            let slot = match *next_free {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next_free = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}
