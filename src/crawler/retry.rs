//! Retry policy with exponential backoff for transient fetch failures
//!
//! ```text
//! delay = min(base_delay * 2^(attempt - 1), max_delay) + jitter
//! ```

use rand::Rng;
use std::time::Duration;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Upper bound of the random jitter added to each backoff
const MAX_JITTER: Duration = Duration::from_millis(250);

/// How many extra attempts a transient failure gets, and how long to wait
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    budget: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(budget: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            budget,
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Policy with the default backoff curve
    pub fn with_budget(budget: u32) -> Self {
        Self::new(budget, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }

    /// Total attempts allowed, the first one included
    pub fn max_attempts(&self) -> u32 {
        self.budget + 1
    }

    /// Returns the wait before the next attempt, or None when `attempt`
    /// (1-indexed, the one that just failed) used up the budget
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts() {
            return None;
        }
        Some(self.backoff(attempt) + jitter())
    }

    /// Backoff without jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_budget(2)
    }
}

fn jitter() -> Duration {
    let ms = rand::thread_rng().gen_range(0..=MAX_JITTER.as_millis() as u64);
    Duration::from_millis(ms)
}
