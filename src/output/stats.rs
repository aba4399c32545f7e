//! Harvest statistics
//!
//! [`HarvestStats`] counts events while a harvest runs. [`RecordStatistics`]
//! is read back from the database for `--stats`.

use crate::storage::{RunRecord, Storage};
use crate::HarvestError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by all workers
#[derive(Debug, Default)]
pub struct HarvestStats {
    listing_pages: AtomicU64,
    timeline_pages: AtomicU64,
    detail_pages: AtomicU64,
    records_emitted: AtomicU64,
    images_succeeded: AtomicU64,
    images_failed: AtomicU64,
    fetch_failures: AtomicU64,
    parse_failures: AtomicU64,
    duplicates_skipped: AtomicU64,
    sink_errors: AtomicU64,
}

/// A point-in-time copy of [`HarvestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub listing_pages: u64,
    pub timeline_pages: u64,
    pub detail_pages: u64,
    pub records_emitted: u64,
    pub images_succeeded: u64,
    pub images_failed: u64,
    pub fetch_failures: u64,
    pub parse_failures: u64,
    pub duplicates_skipped: u64,
    pub sink_errors: u64,
}

impl HarvestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listing_page(&self) {
        self.listing_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timeline_page(&self) {
        self.timeline_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn detail_page(&self) {
        self.detail_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emitted(&self) {
        self.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn image_succeeded(&self) {
        self.images_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn image_failed(&self) {
        self.images_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn duplicates(&self, count: u64) {
        self.duplicates_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn sink_error(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            listing_pages: self.listing_pages.load(Ordering::Relaxed),
            timeline_pages: self.timeline_pages.load(Ordering::Relaxed),
            detail_pages: self.detail_pages.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            images_succeeded: self.images_succeeded.load(Ordering::Relaxed),
            images_failed: self.images_failed.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Logs the counters at info level
    pub fn log(&self) {
        tracing::info!(
            listing_pages = self.listing_pages,
            timeline_pages = self.timeline_pages,
            detail_pages = self.detail_pages,
            records = self.records_emitted,
            images_ok = self.images_succeeded,
            images_failed = self.images_failed,
            fetch_failures = self.fetch_failures,
            parse_failures = self.parse_failures,
            duplicates = self.duplicates_skipped,
            sink_errors = self.sink_errors,
            "Harvest statistics"
        );
    }
}

/// Record index statistics
#[derive(Debug, Clone)]
pub struct RecordStatistics {
    pub total_recipes: u64,
    pub recipes_with_images: u64,
    pub latest_run: Option<RunRecord>,
    /// Recipes last emitted by the latest run
    pub latest_run_recipes: u64,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<RecordStatistics, HarvestError> {
    let total_recipes = storage.count_recipes()?;
    let recipes_with_images = storage.count_recipes_with_images()?;
    let latest_run = storage.get_latest_run()?;
    let latest_run_recipes = match &latest_run {
        Some(run) => storage.count_recipes_in_run(run.id)?,
        None => 0,
    };

    Ok(RecordStatistics {
        total_recipes,
        recipes_with_images,
        latest_run,
        latest_run_recipes,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RecordStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Records:");
    println!("  Total recipes indexed: {}", stats.total_recipes);
    let percentage = if stats.total_recipes > 0 {
        (stats.recipes_with_images as f64 / stats.total_recipes as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "  With stored images: {} ({:.1}%)",
        stats.recipes_with_images, percentage
    );
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  Id: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Recipes emitted: {}", stats.latest_run_recipes);
        }
        None => println!("No harvest runs recorded."),
    }
}
