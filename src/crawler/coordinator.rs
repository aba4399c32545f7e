//! Harvest coordinator - main orchestration logic
//!
//! This module owns the harvest loop:
//! - Opening storage and recording the run
//! - Seeding the frontier with category discovery and the timeline
//! - Running a pool of workers that dispatch tasks by stage
//! - Handing finished records to the sinks
//! - Shutting down on Ctrl-C with a bounded drain

use crate::config::Config;
use crate::crawler::assets::{plan_assets, store_asset, AssetStatus, ImageAssetTask, RecordAssembly};
use crate::crawler::discovery::{extract_category_keys, seed_feeds, RECIPE_ROOT_PATH};
use crate::crawler::extractor::extract_recipe;
use crate::crawler::fetcher::{FetchContext, FetchedPage, Fetcher};
use crate::crawler::frontier::{recipe_key, CrawlTask, Frontier, PushOutcome, Stage};
use crate::crawler::paginator::{on_fetch_failure, on_listing_page};
use crate::crawler::timeline::{parse_timeline, timeline_url};
use crate::output::{
    FanoutSink, HarvestStats, JsonLinesSink, RecordSink, SqliteRecordSink, StatsSnapshot,
};
use crate::record::RecipeRecord;
use crate::state::PaginationState;
use crate::storage::{RunStatus, SqliteStorage, Storage};
use crate::{FetchError, HarvestError};
use reqwest::header::HeaderMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use url::Url;

/// Records between two progress lines
const PROGRESS_INTERVAL: u64 = 25;

/// How a harvest ended
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    pub run_id: i64,
    pub status: RunStatus,
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
}

/// State shared by every worker
struct HarvestContext {
    config: Arc<Config>,
    base_url: Url,
    image_root: PathBuf,
    fetcher: Fetcher,
    frontier: Arc<Frontier>,
    sink: Arc<dyn RecordSink>,
    stats: Arc<HarvestStats>,
}

/// Main harvest coordinator structure
pub struct Coordinator {
    context: Arc<HarvestContext>,
    storage: Arc<Mutex<SqliteStorage>>,
    run_id: i64,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Opens the database and records a new run under `config_hash`. In
    /// incremental mode every recipe already in the index is marked visited
    /// and the records file is appended to instead of truncated.
    pub fn new(config: Config, config_hash: &str) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&config.site.base_url)?;

        let mut storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

        let frontier = Arc::new(Frontier::new());
        if config.output.incremental {
            let known = storage.known_recipe_ids()?;
            tracing::info!("Incremental run: skipping {} known recipes", known.len());
            frontier.seed_visited(known.iter().map(|id| recipe_key(id)));
        }

        let fetcher = Fetcher::from_config(&config)?;
        let records = JsonLinesSink::open(
            Path::new(&config.output.records_path),
            config.output.incremental,
        )?;

        // Nothing fallible runs between recording the run and returning it
        let run_id = storage.create_run(config_hash)?;
        let storage = Arc::new(Mutex::new(storage));

        let index = SqliteRecordSink::new(storage.clone(), run_id);
        let sink: Arc<dyn RecordSink> =
            Arc::new(FanoutSink::new(vec![Box::new(records), Box::new(index)]));

        let context = HarvestContext {
            image_root: PathBuf::from(&config.output.image_root),
            config: Arc::new(config),
            base_url,
            fetcher,
            frontier,
            sink,
            stats: Arc::new(HarvestStats::new()),
        };

        Ok(Self {
            context: Arc::new(context),
            storage,
            run_id,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Runs the harvest until the frontier drains or Ctrl-C is pressed
    pub async fn run(self) -> Result<HarvestSummary, HarvestError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs the harvest until the frontier drains or `shutdown` resolves
    ///
    /// On shutdown the frontier is closed, in-flight tasks get
    /// `shutdown-timeout-secs` to finish and whatever is still running after
    /// that is aborted. Records still waiting on images are not emitted.
    pub async fn run_until<F>(self, shutdown: F) -> Result<HarvestSummary, HarvestError>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let ctx = self.context.clone();
        tracing::info!(
            "Starting harvest run {} against {} with {} workers",
            self.run_id,
            ctx.base_url,
            ctx.config.crawler.workers
        );

        if let Err(e) = ctx.seed() {
            tracing::error!("Cannot seed harvest run {}: {}", self.run_id, e);
            let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(status_err) = storage.update_run_status(self.run_id, RunStatus::Failed) {
                tracing::warn!("Failed to mark run {} failed: {}", self.run_id, status_err);
            }
            return Err(e);
        }

        let mut workers = JoinSet::new();
        for worker_id in 0..ctx.config.crawler.workers {
            workers.spawn(worker_loop(worker_id, ctx.clone()));
        }

        let interrupted = tokio::select! {
            _ = drain(&mut workers) => false,
            _ = shutdown => true,
        };

        if interrupted {
            let discarded = ctx.frontier.close();
            let grace = Duration::from_secs(ctx.config.crawler.shutdown_timeout_secs);
            tracing::info!(
                "Shutdown requested: discarded {} queued tasks, draining {} in flight",
                discarded,
                ctx.frontier.in_flight()
            );

            if tokio::time::timeout(grace, drain(&mut workers)).await.is_err() {
                tracing::warn!("Workers still busy after {:?}, aborting", grace);
                workers.abort_all();
                drain(&mut workers).await;
            }
        } else {
            tracing::info!(
                "Frontier is empty, harvest complete ({} URLs visited)",
                ctx.frontier.visited_count()
            );
        }

        if let Err(e) = ctx.sink.finish() {
            ctx.stats.sink_error();
            tracing::warn!("Failed to flush record sinks: {}", e);
        }

        let status = if interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        {
            let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
            storage.update_run_status(self.run_id, status)?;
        }

        let stats = ctx.stats.snapshot();
        stats.log();
        tracing::info!(
            "Harvest run {} {} in {:?}",
            self.run_id,
            status.to_db_string(),
            start_time.elapsed()
        );

        Ok(HarvestSummary {
            run_id: self.run_id,
            status,
            stats,
            elapsed: start_time.elapsed(),
        })
    }
}

/// Waits for every worker, logging panics
async fn drain(workers: &mut JoinSet<()>) {
    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!("Worker panicked: {}", e);
            }
        }
    }
}

/// Marks the task as complete however processing ends
struct InFlight<'a>(&'a Frontier);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.complete();
    }
}

async fn worker_loop(worker_id: u32, ctx: Arc<HarvestContext>) {
    tracing::trace!(worker_id, "Worker started");
    while let Some(task) = ctx.frontier.next().await {
        let _guard = InFlight(&ctx.frontier);
        ctx.process(task).await;
    }
    tracing::trace!(worker_id, "Worker finished");
}

impl HarvestContext {
    /// Queues category discovery and, when enabled, the first timeline page
    fn seed(&self) -> Result<(), HarvestError> {
        let root = self.base_url.join(RECIPE_ROOT_PATH)?;
        self.enqueue(CrawlTask::DiscoverCategories { url: root });

        let quota = self.config.quota.timeline;
        if quota > 0 {
            let url = timeline_url(&self.base_url, 1)?;
            self.enqueue(CrawlTask::Timeline { url, page: 1, quota });
        }
        Ok(())
    }

    fn enqueue(&self, task: CrawlTask) -> bool {
        let stage = task.stage();
        match self.frontier.push(task) {
            PushOutcome::Queued => true,
            PushOutcome::Duplicate => {
                self.stats.duplicates(1);
                false
            }
            PushOutcome::Closed => {
                tracing::trace!(stage = %stage, "Frontier closed, task dropped");
                false
            }
        }
    }

    async fn process(&self, task: CrawlTask) {
        match task {
            CrawlTask::DiscoverCategories { url } => self.discover(&url).await,
            CrawlTask::Listing { url, state } => self.listing(&url, state).await,
            CrawlTask::Timeline { url, page, quota } => self.timeline(&url, page, quota).await,
            CrawlTask::Detail { url } => self.detail(&url).await,
            CrawlTask::Image {
                task,
                slot,
                assembly,
            } => self.image(task, slot, assembly).await,
        }
    }

    /// Fetches a page, logging and counting a failure
    async fn fetch_page(&self, url: &Url, stage: Stage) -> Result<FetchedPage, FetchError> {
        let result = self
            .fetcher
            .fetch(url, HeaderMap::new(), &FetchContext::new(stage))
            .await;
        if let Err(e) = &result {
            self.stats.fetch_failure();
            tracing::warn!(url = %url, stage = %stage, "Fetch failed: {}", e);
        }
        result
    }

    async fn discover(&self, url: &Url) {
        let keys = match self.fetch_page(url, Stage::CategoryDiscovery).await {
            Ok(page) => match page.text() {
                Some(html) => extract_category_keys(html, &page.final_url),
                None => {
                    self.stats.parse_failure();
                    tracing::warn!(url = %url, stage = %Stage::CategoryDiscovery, "Recipe root is not valid UTF-8");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        let feeds = seed_feeds(&keys, &self.config.quota);
        tracing::info!(
            "Discovered {} categories, seeding {} feeds",
            keys.len(),
            feeds.len()
        );

        for state in feeds {
            self.enqueue_listing(state);
        }
    }

    fn enqueue_listing(&self, state: PaginationState) {
        match state.page_url(&self.base_url) {
            Ok(url) => {
                self.enqueue(CrawlTask::Listing { url, state });
            }
            Err(e) => tracing::warn!(feed = %state.feed, "Cannot build listing URL: {}", e),
        }
    }

    async fn listing(&self, url: &Url, state: PaginationState) {
        let feed = state.feed.clone();
        let page_number = state.current_page;

        let outcome = match self.fetch_page(url, Stage::ListingPage).await {
            Ok(page) => {
                self.stats.listing_page();
                on_listing_page(state, &page)
            }
            Err(e) => on_fetch_failure(state, &e),
        };

        let found = outcome.detail_links.len();
        let queued = outcome
            .detail_links
            .into_iter()
            .filter(|link| self.enqueue(CrawlTask::Detail { url: link.clone() }))
            .count();
        tracing::debug!(
            url = %url,
            feed = %feed,
            page = page_number,
            "Listing page: {} detail links, {} new",
            found,
            queued
        );

        match outcome.stop_reason {
            Some(reason) => tracing::info!(feed = %feed, page = page_number, "Feed stopped: {}", reason),
            None => self.enqueue_listing(outcome.state),
        }
    }

    async fn timeline(&self, url: &Url, page_number: u32, quota: u32) {
        let Ok(page) = self.fetch_page(url, Stage::TimelinePage).await else {
            return;
        };
        self.stats.timeline_page();

        let outcome = match parse_timeline(&page.body, &page.final_url, page_number, quota) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.stats.parse_failure();
                tracing::warn!(url = %url, stage = %Stage::TimelinePage, "{}", e);
                return;
            }
        };

        tracing::debug!(
            url = %url,
            page = page_number,
            "Timeline page: {} recipe entries",
            outcome.detail_links.len()
        );
        for link in outcome.detail_links {
            self.enqueue(CrawlTask::Detail { url: link });
        }

        if let Some(next) = outcome.next_page {
            match timeline_url(&self.base_url, next) {
                Ok(url) => {
                    self.enqueue(CrawlTask::Timeline {
                        url,
                        page: next,
                        quota,
                    });
                }
                Err(e) => tracing::warn!("Cannot build timeline URL: {}", e),
            }
        }
    }

    async fn detail(&self, url: &Url) {
        let Ok(page) = self.fetch_page(url, Stage::DetailPage).await else {
            return;
        };
        self.stats.detail_page();

        let record = match extract_recipe(&page.body, url) {
            Ok(record) => record,
            Err(e) => {
                self.stats.parse_failure();
                tracing::warn!(url = %url, stage = %Stage::DetailPage, "{}", e);
                return;
            }
        };

        let tasks = plan_assets(&record);
        tracing::debug!(
            recipe_id = %record.recipe_id,
            images = tasks.len(),
            "Extracted recipe"
        );

        if tasks.is_empty() {
            self.emit(record);
            return;
        }

        let recipe_id = record.recipe_id.clone();
        let assembly = Arc::new(RecordAssembly::new(record, tasks.clone()));
        for (slot, task) in tasks.into_iter().enumerate() {
            let image = CrawlTask::Image {
                task,
                slot,
                assembly: assembly.clone(),
            };
            if !self.enqueue(image) {
                tracing::debug!(recipe_id = %recipe_id, "Image task refused, record will not be emitted");
                return;
            }
        }
    }

    async fn image(&self, task: ImageAssetTask, slot: usize, assembly: Arc<RecordAssembly>) {
        let status = match store_asset(&self.fetcher, &self.image_root, &task, assembly.referer()).await {
            Ok(path) => {
                self.stats.image_succeeded();
                tracing::debug!(
                    recipe_id = %task.owner_recipe_id,
                    path = %path.display(),
                    "Stored image"
                );
                AssetStatus::Succeeded
            }
            Err(e) => {
                self.stats.image_failed();
                tracing::warn!(
                    url = %task.source_url,
                    stage = %Stage::ImageAsset,
                    recipe_id = %task.owner_recipe_id,
                    "Image failed: {}",
                    e
                );
                AssetStatus::Failed
            }
        };

        if let Some(record) = assembly.settle(slot, status) {
            self.emit(record);
        }
    }

    fn emit(&self, record: RecipeRecord) {
        match self.sink.emit(&record) {
            Ok(()) => {
                self.stats.record_emitted();
                let emitted = self.stats.snapshot().records_emitted;
                if emitted % PROGRESS_INTERVAL == 0 {
                    tracing::info!(
                        "Progress: {} records emitted, {} tasks queued",
                        emitted,
                        self.frontier.queued()
                    );
                }
            }
            Err(e) => {
                self.stats.sink_error();
                tracing::warn!(recipe_id = %record.recipe_id, "Failed to emit record: {}", e);
            }
        }
    }
}

/// Opens storage, runs a harvest to completion and returns its summary
pub async fn run_harvest(config: Config, config_hash: &str) -> Result<HarvestSummary, HarvestError> {
    let coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run().await
}
