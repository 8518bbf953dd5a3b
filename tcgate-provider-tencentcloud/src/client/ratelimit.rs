//! Per-action request spacing
//!
//! Tencent Cloud throttles each API action separately. The limiter hands out
//! evenly spaced time slots per action; callers sleep until their slot.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_CALLS_PER_SECOND: u32 = 20;

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(calls_per_second: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / calls_per_second.max(1),
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until `action` may be called again
    pub async fn check(&self, action: &str) {
        let wait = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match slots.get(action) {
                Some(next) if *next > now => *next,
                _ => now,
            };
            slots.insert(action.to_string(), slot + self.interval);
            slot - now
        };

        if !wait.is_zero() {
            log::debug!("rate limit: {} waits {:?}", action, wait);
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CALLS_PER_SECOND)
    }
}
