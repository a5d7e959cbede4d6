use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// Paces admissions on the submission clock.
///
/// Successive [`RateLimiter::acquire`] calls return at least `1/qps` apart, no matter how
/// long the admitted jobs take. There is a single caller (the admission loop), so a plain
/// sleep-based pacer is enough; concurrent admission would need a token bucket instead.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl RateLimiter {
    /// `qps == 0` disables pacing.
    pub fn new(qps: u64) -> Self {
        // Round the interval up so `k` admissions never fit into less than `(k-1)/qps`.
        let interval = (qps > 0).then(|| Duration::from_nanos(1_000_000_000u64.div_ceil(qps)));
        Self {
            interval,
            last: None,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.interval.is_none()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Waits for the next admission slot and returns how long it waited.
    pub async fn acquire(&mut self) -> Duration {
        let Some(interval) = self.interval else {
            return Duration::ZERO;
        };

        let now = Instant::now();
        let delay = match self.last {
            Some(last) if last + interval > now => {
                let due = last + interval;
                sleep_until(due).await;
                due - now
            }
            _ => Duration::ZERO,
        };

        self.last = Some(Instant::now());
        delay
    }
}
