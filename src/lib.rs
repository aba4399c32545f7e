//! Recipe-Harvest: a quota-bounded recipe site harvester
//!
//! This crate walks a category-organized recipe site, extracts structured
//! recipe records from detail pages and stores each record's images under
//! deterministic paths, emitting the finished records as JSON lines.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Recipe-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// These are the only errors that abort a harvest; they are raised before
/// any request is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse quota file {path}: {source}")]
    QuotaFile {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors reported by the fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeouts, connection resets, 5xx and 429 responses
    #[error("Transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },

    /// Non-retryable HTTP status (404 and the other 4xx codes)
    #[error("HTTP {status} for {url}")]
    Terminal { url: String, status: u16 },

    /// A transient failure that outlived the retry budget
    #[error("Gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    /// Redirect loop or more hops than the client follows
    #[error("Too many redirects from {url}")]
    TooManyRedirects { url: String },

    /// Undecodable bodies and other broken responses
    #[error("Malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Returns true if another attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns true if the server kept redirecting the request
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::TooManyRedirects { .. })
    }

    /// The URL the failing request was made for
    pub fn url(&self) -> &str {
        match self {
            Self::Transient { url, .. }
            | Self::Terminal { url, .. }
            | Self::Exhausted { url, .. }
            | Self::TooManyRedirects { url }
            | Self::Malformed { url, .. } => url,
            Self::InvalidUrl(url) => url,
        }
    }
}

/// A document that cannot produce any output
///
/// Drops only the page it was raised for.
#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("Document at {url} is not valid UTF-8")]
    NotUtf8 { url: String },

    #[error("Document at {url} is empty")]
    EmptyDocument { url: String },

    #[error("No recipe id in {url}")]
    MissingRecipeId { url: String },

    #[error("Malformed timeline payload at {url}: {source}")]
    Timeline {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Recipe-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use record::{Ingredient, IngredientSection, RecipeRecord, Step};
pub use state::{CategoryKey, ListingFeed, PaginationState};
pub use url::{extract_domain, normalize_url};
