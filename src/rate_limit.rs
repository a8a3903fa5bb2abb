//! Shared request pacing across concurrent harvest jobs.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::{trace, warn};

/// Grants permission to issue a request at most `requests_per_second` times
/// per second, across every job holding a reference to it.
///
/// The lock is held while waiting, so grants are totally ordered and each one
/// is at least one interval after the previous. The first grant is immediate.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Rates that are not positive and finite, or too small to express as
    /// an interval, fall back to one request per second.
    pub fn new(requests_per_second: f64) -> Self {
        let interval = Duration::try_from_secs_f64(1.0 / requests_per_second).unwrap_or_else(|_| {
            warn!(requests_per_second, "Unusable request rate; using one request per second");
            Duration::from_secs(1)
        });
        Self::with_interval(interval)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last_grant: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next grant is allowed, then record it.
    pub async fn acquire(&self) {
        let mut last = self.last_grant.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if ready_at > Instant::now() {
                trace!(wait_ms = (ready_at - Instant::now()).as_millis(), "Rate limited");
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
