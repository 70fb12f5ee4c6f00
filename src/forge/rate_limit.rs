//! Token-bucket gate for outbound forge calls.
//!
//! GitHub allows 5,000 authenticated requests per hour. The limiter keeps a
//! reserve slice of that budget for interactive operations (probes, manual
//! fetches) and paces the rest so a large backfill never bursts the API.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Snapshot of the limiter's current budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterStatus {
    /// Tokens currently available.
    pub available: u32,
    /// Effective capacity (`max_requests - reserve`).
    pub max: u32,
    /// Share of the budget consumed, 0-100.
    pub utilization_percent: u32,
}

struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

/// Thread-safe token bucket shared by every sync session in the process.
///
/// All state lives behind one async mutex; `acquire` holds the lock across
/// its waits so the pacing delay applies globally, not per caller.
pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    min_delay: Duration,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// Build a limiter with `reserve_tokens` permanently withheld from the
    /// bucket. The pacing delay is derived from the raw `max_requests` so the
    /// reserve does not slow down regular traffic.
    pub fn new(max_requests: u32, window_seconds: u64, reserve_tokens: u32) -> Self {
        let capacity = max_requests.saturating_sub(reserve_tokens).max(1);
        let min_delay_ms = (window_seconds * 1000) / u64::from(max_requests.max(1));

        Self {
            capacity,
            window: Duration::from_secs(window_seconds),
            min_delay: Duration::from_millis(min_delay_ms),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Defaults matching GitHub's authenticated quota: 4,800 requests per
    /// hour with a 200-token reserve.
    pub fn github_default() -> Self {
        Self::new(4800, 3600, 200)
    }

    /// Block until `tokens` are available, take them, then sleep the pacing
    /// delay. Never fails.
    pub async fn acquire(&self, tokens: u32) {
        let mut state = self.state.lock().await;

        self.refill(&mut state);
        while state.tokens < tokens {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.refill(&mut state);
        }

        state.tokens -= tokens;

        // Spread requests evenly across the window. The lock is held on
        // purpose: pacing is global.
        tokio::time::sleep(self.min_delay).await;
    }

    /// Current budget snapshot.
    pub async fn status(&self) -> RateLimiterStatus {
        let mut state = self.state.lock().await;
        self.refill(&mut state);

        let used = self.capacity - state.tokens;
        RateLimiterStatus {
            available: state.tokens,
            max: self.capacity,
            utilization_percent: (u64::from(used) * 100 / u64::from(self.capacity)) as u32,
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let elapsed = state.last_refill.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let added = refill_amount(elapsed.as_secs_f64(), self.capacity, self.window);
            state.tokens = (state.tokens + added).min(self.capacity);
            state.last_refill = Instant::now();
        }
    }
}

/// Tokens earned over `elapsed_secs`, floor-rounded.
fn refill_amount(elapsed_secs: f64, capacity: u32, window: Duration) -> u32 {
    let rate = f64::from(capacity) / window.as_secs_f64();
    let earned = (elapsed_secs * rate).floor();
    if earned <= 0.0 {
        0
    } else if earned >= f64::from(u32::MAX) {
        capacity
    } else {
        (earned as u32).min(capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refill_is_floor_rounded_and_capped() {
        let window = Duration::from_secs(3600);
        // 4600 tokens per hour -> ~1.28 per second.
        assert_eq!(refill_amount(1.0, 4600, window), 1);
        assert_eq!(refill_amount(2.0, 4600, window), 2);
        assert_eq!(refill_amount(0.5, 4600, window), 0);
        // Never exceeds capacity even after a long idle stretch.
        assert_eq!(refill_amount(1_000_000.0, 4600, window), 4600);
    }

    #[tokio::test]
    async fn acquire_decrements_and_reports_utilization() {
        let limiter = RateLimiter::new(10, 1, 0);

        limiter.acquire(1).await;
        limiter.acquire(1).await;

        let status = limiter.status().await;
        assert_eq!(status.max, 10);
        assert!(status.available <= 9);
        assert!(status.utilization_percent <= 100);
    }

    #[tokio::test]
    async fn reserve_shrinks_effective_capacity() {
        let limiter = RateLimiter::new(5000, 3600, 200);
        let status = limiter.status().await;
        assert_eq!(status.max, 4800);
        assert_eq!(status.available, 4800);
        assert_eq!(status.utilization_percent, 0);
    }
}
