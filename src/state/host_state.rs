use std::time::{Duration, Instant};

/// Tracks the politeness state of one host during crawling
///
/// The delay before the next request is drawn when a request starts, so each
/// gap between two requests to the same host is independently randomized.
#[derive(Debug, Clone)]
pub struct HostState {
    /// Number of requests started against this host
    pub request_count: u32,

    /// When the last request to this host started
    pub last_request_time: Option<Instant>,

    /// Gap required after `last_request_time` before the next request
    pub next_delay: Duration,
}

impl HostState {
    /// Creates a state for a host that has not been contacted yet
    pub fn new() -> Self {
        Self {
            request_count: 0,
            last_request_time: None,
            next_delay: Duration::ZERO,
        }
    }

    /// Records that a request started, and the gap the next one must honor
    pub fn record_request(&mut self, now: Instant, next_delay: Duration) {
        self.request_count += 1;
        self.last_request_time = Some(now);
        self.next_delay = next_delay;
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.next_delay {
            Some(self.next_delay - elapsed)
        } else {
            None
        }
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::new()
    }
}
