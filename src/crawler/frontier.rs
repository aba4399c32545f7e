//! The crawl frontier
//!
//! A single queue of stage-tagged tasks shared by every worker, together with
//! the visited set. Pushing a task checks and records all of its dedup keys
//! under one lock, so two workers discovering the same recipe at the same time
//! enqueue it once.
//!
//! The crawl is over when the queue is empty and no task is in flight.

use crate::crawler::assets::{ImageAssetTask, RecordAssembly};
use crate::state::PaginationState;
use crate::url::{dedup_key, recipe_id_from_url};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use url::Url;

/// Pipeline stage a task belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    CategoryDiscovery,
    ListingPage,
    TimelinePage,
    DetailPage,
    ImageAsset,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CategoryDiscovery => "category-discovery",
            Self::ListingPage => "listing-page",
            Self::TimelinePage => "timeline-page",
            Self::DetailPage => "detail-page",
            Self::ImageAsset => "image-asset",
        };
        f.write_str(name)
    }
}

/// A unit of work
#[derive(Debug, Clone)]
pub enum CrawlTask {
    /// The recipe root page listing every category
    DiscoverCategories { url: Url },

    /// One listing page of a feed; the state carries the page number
    Listing { url: Url, state: PaginationState },

    /// One page of the timeline API
    Timeline { url: Url, page: u32, quota: u32 },

    Detail { url: Url },

    /// One image of a record waiting in `assembly`
    Image {
        task: ImageAssetTask,
        slot: usize,
        assembly: Arc<RecordAssembly>,
    },
}

impl CrawlTask {
    pub fn stage(&self) -> Stage {
        match self {
            Self::DiscoverCategories { .. } => Stage::CategoryDiscovery,
            Self::Listing { .. } => Stage::ListingPage,
            Self::Timeline { .. } => Stage::TimelinePage,
            Self::Detail { .. } => Stage::DetailPage,
            Self::Image { .. } => Stage::ImageAsset,
        }
    }

    pub fn url(&self) -> &Url {
        match self {
            Self::DiscoverCategories { url }
            | Self::Listing { url, .. }
            | Self::Timeline { url, .. }
            | Self::Detail { url } => url,
            Self::Image { task, .. } => &task.source_url,
        }
    }

    /// Keys recorded in the visited set when this task is queued
    ///
    /// Detail pages are keyed by URL and by recipe id, so the same recipe
    /// reached through differently shaped links is fetched once. Image tasks
    /// are never deduplicated.
    pub fn dedup_keys(&self) -> Vec<String> {
        match self {
            Self::Image { .. } => Vec::new(),
            Self::Detail { url } => {
                let mut keys = vec![dedup_key(url)];
                if let Some(id) = recipe_id_from_url(url) {
                    keys.push(recipe_key(&id));
                }
                keys
            }
            other => vec![dedup_key(other.url())],
        }
    }
}

/// Visited-set key of a recipe id
pub fn recipe_key(recipe_id: &str) -> String {
    format!("recipe:{}", recipe_id)
}

/// Normalized URLs and recipe ids already enqueued
#[derive(Debug, Default)]
pub struct VisitedSet {
    keys: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Records every key unless one of them is already present
    ///
    /// Returns false, leaving the set unchanged, on any hit.
    pub fn check_and_insert(&mut self, keys: &[String]) -> bool {
        if keys.iter().any(|k| self.keys.contains(k)) {
            return false;
        }
        self.keys.extend(keys.iter().cloned());
        true
    }

    pub fn insert(&mut self, key: String) {
        self.keys.insert(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Result of [`Frontier::push`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    Duplicate,
    /// The frontier is shutting down
    Closed,
}

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<CrawlTask>,
    visited: VisitedSet,
    in_flight: usize,
    closed: bool,
}

/// Concurrency-safe work queue with dedup and quiescence detection
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    notify: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks keys as visited without queueing anything
    ///
    /// Used to skip recipes indexed by earlier runs.
    pub fn seed_visited(&self, keys: impl IntoIterator<Item = String>) {
        let mut inner = self.lock();
        for key in keys {
            inner.visited.insert(key);
        }
    }

    /// Queues a task unless any of its keys was seen before
    pub fn push(&self, task: CrawlTask) -> PushOutcome {
        let keys = task.dedup_keys();
        {
            let mut inner = self.lock();
            if inner.closed {
                return PushOutcome::Closed;
            }
            if !inner.visited.check_and_insert(&keys) {
                return PushOutcome::Duplicate;
            }
            inner.queue.push_back(task);
        }
        self.notify.notify_waiters();
        PushOutcome::Queued
    }

    /// Takes the next task, waiting while other workers may still add work
    ///
    /// Returns None once the frontier is closed, or once it is empty with
    /// nothing in flight. Every task returned must be followed by a call to
    /// [`Frontier::complete`].
    pub async fn next(&self) -> Option<CrawlTask> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                if inner.closed {
                    return None;
                }
                if let Some(task) = inner.queue.pop_front() {
                    inner.in_flight += 1;
                    return Some(task);
                }
                if inner.in_flight == 0 {
                    drop(inner);
                    // Wake the other idle workers so they can observe quiescence
                    self.notify.notify_waiters();
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks a task returned by [`Frontier::next`] as finished
    pub fn complete(&self) {
        let idle = {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            inner.in_flight == 0 && inner.queue.is_empty()
        };
        if idle {
            self.notify.notify_waiters();
        }
    }

    /// Discards queued tasks and refuses new ones
    ///
    /// Returns the number of tasks discarded.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut inner = self.lock();
            inner.closed = true;
            let discarded = inner.queue.len();
            inner.queue.clear();
            discarded
        };
        self.notify.notify_waiters();
        discarded
    }

    pub fn queued(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }
}
