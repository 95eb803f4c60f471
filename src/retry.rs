//! Bounded retry with linear backoff, decoupled from the clock.

use anyhow::Result;
use std::time::Duration;
use tracing::warn;

/// Blocking delay source. Production code sleeps the thread; tests record.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after the first failure; the n-th failure waits `n * step`.
    pub step: Duration,
}

impl RetryPolicy {
    /// Telegram uploads: 7 tries, waiting 15s, 30s, ... 105s after each failure.
    pub const PUBLISH: Self = Self {
        max_attempts: 7,
        step: Duration::from_secs(15),
    };

    /// Wait after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.step * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::PUBLISH
    }
}

/// Runs `op` until it succeeds or `policy.max_attempts` is used up. The
/// closure receives the 1-based attempt number. Every failure waits
/// `delay_after(attempt)`, the last one included, so exhaustion yields `None`
/// only after the full schedule has elapsed.
pub fn retry<T>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    label: &str,
    mut op: impl FnMut(u32) -> Result<T>,
) -> Option<T> {
    for attempt in 1..=policy.max_attempts {
        match op(attempt) {
            Ok(value) => return Some(value),
            Err(err) => {
                let wait = policy.delay_after(attempt);
                warn!(
                    "{label} failed (attempt {attempt}/{}), waiting {}s: {err:#}",
                    policy.max_attempts,
                    wait.as_secs()
                );
                sleeper.sleep(wait);
            }
        }
    }
    warn!(
        "{label} failed after {} attempts, giving up",
        policy.max_attempts
    );
    None
}
