//! Crawler module for recipe harvesting
//!
//! This module contains the harvest pipeline, including:
//! - HTTP fetching with per-host politeness and retry logic
//! - The deduplicating task frontier
//! - Category discovery, listing pagination and the timeline walker
//! - Recipe extraction and image asset resolution
//! - Overall harvest coordination

mod assets;
mod coordinator;
mod discovery;
mod extractor;
mod fetcher;
mod frontier;
mod paginator;
mod parser;
mod retry;
mod scheduler;
mod timeline;

pub use assets::{
    plan_assets, source_extension, store_asset, target_path, AssetError, AssetRole, AssetStatus,
    ImageAssetTask, RecordAssembly, IMAGE_DIR,
};
pub use coordinator::{run_harvest, Coordinator, HarvestSummary};
pub use discovery::{extract_category_keys, seed_feeds, RECIPE_ROOT_PATH};
pub use extractor::{extract_recipe, parse_recipe};
pub use fetcher::{build_http_client, FetchContext, FetchedPage, Fetcher};
pub use frontier::{recipe_key, CrawlTask, Frontier, PushOutcome, Stage, VisitedSet};
pub use paginator::{on_fetch_failure, on_listing_page, transition, ListingOutcome, StopReason};
pub use parser::{extract_links, resolve_link};
pub use retry::RetryPolicy;
pub use scheduler::{HostPermit, HostScheduler};
pub use timeline::{parse_timeline, timeline_url, TimelineOutcome};

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete harvest
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Open the database and record a new run
/// 2. Discover categories and seed one feed per category plus hot/popular
/// 3. Page through every feed within its quota
/// 4. Extract each recipe and download its images
/// 5. Emit finished records to the JSON-lines file and the record index
///
/// # Arguments
///
/// * `config` - The validated harvest configuration
/// * `config_hash` - Hash of the configuration file, stored with the run
pub async fn harvest(config: Config, config_hash: &str) -> Result<HarvestSummary, HarvestError> {
    run_harvest(config, config_hash).await
}
