use crate::state::{CategoryKey, ListingFeed};
use serde::Deserialize;
use std::collections::BTreeMap;

/// User agent sent when the configuration does not name one
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Main configuration structure for Recipe-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    pub output: OutputConfig,
}

/// The site being harvested
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Scheme and host of the site, e.g. `https://m.meishichina.com`
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of worker tasks draining the frontier
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Maximum number of concurrent requests to one host
    #[serde(rename = "max-requests-per-host", default = "default_per_host")]
    pub max_requests_per_host: u32,

    /// Lower bound of the randomized gap between requests to one host
    #[serde(rename = "delay-min-ms", default = "default_delay_min")]
    pub delay_min_ms: u64,

    /// Upper bound of the randomized gap between requests to one host
    #[serde(rename = "delay-max-ms", default = "default_delay_max")]
    pub delay_max_ms: u64,

    /// Extra attempts allowed for a transient failure
    #[serde(rename = "retry-budget", default = "default_retry_budget")]
    pub retry_budget: u32,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long in-flight tasks may drain after a shutdown signal
    #[serde(rename = "shutdown-timeout-secs", default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_requests_per_host: default_per_host(),
            delay_min_ms: default_delay_min(),
            delay_max_ms: default_delay_max(),
            retry_budget: default_retry_budget(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

/// Per-feed page quotas
///
/// A quota is the maximum number of listing pages fetched for a feed; zero
/// disables the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// Quota of any category without its own entry
    #[serde(default = "default_quota")]
    pub default: u32,

    #[serde(default)]
    pub hot: u32,

    #[serde(default)]
    pub pop: u32,

    /// Pages of the timeline API to walk
    #[serde(default)]
    pub timeline: u32,

    /// JSON file whose entries override this table, relative to the config file
    #[serde(rename = "quota-file", default)]
    pub quota_file: Option<String>,

    #[serde(default)]
    pub categories: BTreeMap<String, u32>,
}

impl QuotaConfig {
    /// Quota of one category: its own entry, else the default
    pub fn for_category(&self, key: &CategoryKey) -> u32 {
        self.categories
            .get(key.as_str())
            .copied()
            .unwrap_or(self.default)
    }

    pub fn for_feed(&self, feed: &ListingFeed) -> u32 {
        match feed {
            ListingFeed::Category(key) => self.for_category(key),
            ListingFeed::Hot => self.hot,
            ListingFeed::Popular => self.pop,
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default: default_quota(),
            hot: 0,
            pop: 0,
            timeline: 0,
            quota_file: None,
            categories: BTreeMap::new(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// JSON-lines file receiving one record per line
    #[serde(rename = "records-path")]
    pub records_path: String,

    /// Directory image files are written under
    #[serde(rename = "image-root")]
    pub image_root: String,

    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Skip recipes already present in the database
    #[serde(default)]
    pub incremental: bool,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_workers() -> u32 {
    16
}

fn default_per_host() -> u32 {
    10
}

fn default_delay_min() -> u64 {
    1000
}

fn default_delay_max() -> u64 {
    3000
}

fn default_retry_budget() -> u32 {
    2
}

fn default_request_timeout() -> u64 {
    180
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_quota() -> u32 {
    5
}
