//! Per-host request scheduling
//!
//! This module handles:
//! - Per-host concurrency limits via semaphores
//! - A randomized politeness delay between request starts to the same host
//!
//! Requests to different hosts never wait on each other.

use crate::config::CrawlerConfig;
use crate::state::HostState;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Permission to send one request to a host
///
/// The host's concurrency slot is released when this is dropped.
pub struct HostPermit {
    pub host: String,

    /// Time spent waiting for the slot and the politeness delay
    pub waited: Duration,

    _permit: OwnedSemaphorePermit,
}

struct HostSlot {
    permits: Arc<Semaphore>,
    state: tokio::sync::Mutex<HostState>,
}

/// Hands out per-host request permits
pub struct HostScheduler {
    max_per_host: usize,
    delay_min: Duration,
    delay_max: Duration,
    hosts: Mutex<HashMap<String, Arc<HostSlot>>>,
}

impl HostScheduler {
    pub fn new(max_per_host: u32, delay_min: Duration, delay_max: Duration) -> Self {
        Self {
            max_per_host: max_per_host.max(1) as usize,
            delay_min,
            delay_max: delay_max.max(delay_min),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.max_requests_per_host,
            Duration::from_millis(config.delay_min_ms),
            Duration::from_millis(config.delay_max_ms),
        )
    }

    /// Waits until a request to `host` may start
    ///
    /// 1. Acquires one of the host's concurrency slots
    /// 2. Sleeps out whatever remains of the gap since the last request start
    /// 3. Records this request start and draws the gap for the next one
    ///
    /// Returns None only if the host's semaphore was closed.
    pub async fn acquire(&self, host: &str) -> Option<HostPermit> {
        let started = Instant::now();
        let slot = self.slot(host);
        let permit = slot.permits.clone().acquire_owned().await.ok()?;

        // Holding the state lock across the sleep serializes request starts
        let mut state = slot.state.lock().await;
        if let Some(wait) = state.time_until_next_request(Instant::now()) {
            tracing::trace!(host = %host, wait_ms = wait.as_millis() as u64, "Politeness delay");
            tokio::time::sleep(wait).await;
        }
        state.record_request(Instant::now(), self.draw_delay());
        drop(state);

        Some(HostPermit {
            host: host.to_string(),
            waited: started.elapsed(),
            _permit: permit,
        })
    }

    /// Number of requests started against a host so far
    #[cfg(test)]
    pub async fn request_count(&self, host: &str) -> u32 {
        let slot = self.slot(host);
        let state = slot.state.lock().await;
        state.request_count
    }

    fn slot(&self, host: &str) -> Arc<HostSlot> {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        hosts
            .entry(host.to_string())
            .or_insert_with(|| {
                Arc::new(HostSlot {
                    permits: Arc::new(Semaphore::new(self.max_per_host)),
                    state: tokio::sync::Mutex::new(HostState::new()),
                })
            })
            .clone()
    }

    /// Uniform draw from `[delay_min, delay_max]`
    fn draw_delay(&self) -> Duration {
        if self.delay_min == self.delay_max {
            return self.delay_min;
        }
        let min = self.delay_min.as_millis() as u64;
        let max = self.delay_max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let scheduler = HostScheduler::new(2, Duration::from_secs(5), Duration::from_secs(5));
        let permit = tokio::time::timeout(Duration::from_millis(500), scheduler.acquire("a.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(permit.host, "a.com");
        assert_eq!(scheduler.request_count("a.com").await, 1);
    }

    #[tokio::test]
    async fn test_politeness_delay_between_starts() {
        let scheduler = HostScheduler::new(4, Duration::from_millis(80), Duration::from_millis(80));
        let start = Instant::now();
        let _a = scheduler.acquire("a.com").await.unwrap();
        let _b = scheduler.acquire("a.com").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(75));
    }

    #[tokio::test]
    async fn test_hosts_are_independent() {
        let scheduler = HostScheduler::new(1, Duration::from_secs(5), Duration::from_secs(5));
        let _a = scheduler.acquire("a.com").await.unwrap();
        let b = tokio::time::timeout(Duration::from_millis(500), scheduler.acquire("b.com")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_concurrency_cap_per_host() {
        let scheduler = HostScheduler::new(1, Duration::ZERO, Duration::ZERO);
        let held = scheduler.acquire("a.com").await.unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), scheduler.acquire("a.com")).await;
        assert!(blocked.is_err());

        drop(held);
        let freed =
            tokio::time::timeout(Duration::from_millis(500), scheduler.acquire("a.com")).await;
        assert!(freed.is_ok());
    }

    #[test]
    fn test_draw_delay_within_bounds() {
        let scheduler = HostScheduler::new(1, Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..50 {
            let delay = scheduler.draw_delay();
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(20));
        }
    }
}
