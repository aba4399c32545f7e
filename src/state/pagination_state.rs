//! Pagination state for listing feeds
//!
//! Each feed (a category, or the hot/popular lists) walks its listing pages
//! one at a time. The state travels inside the listing task, so only the
//! worker holding that task ever touches it.

use std::fmt;
use url::Url;

/// Identifier of a site category, taken from its URL path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryKey(String);

impl CategoryKey {
    /// Creates a key from a path segment; empty segments are rejected
    pub fn new(segment: &str) -> Option<Self> {
        let trimmed = segment.trim().trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A paginated listing source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListingFeed {
    /// `/recipe/category/{key}/{page}/`
    Category(CategoryKey),
    /// `/recipe/all/hot/{page}/`
    Hot,
    /// `/recipe/all/pop/{page}/`
    Popular,
}

impl ListingFeed {
    /// Site path of the given listing page
    pub fn page_path(&self, page: u32) -> String {
        match self {
            Self::Category(key) => format!("/recipe/category/{}/{}/", key, page),
            Self::Hot => format!("/recipe/all/hot/{}/", page),
            Self::Popular => format!("/recipe/all/pop/{}/", page),
        }
    }

    /// Absolute URL of the given listing page
    pub fn page_url(&self, base: &Url, page: u32) -> Result<Url, url::ParseError> {
        base.join(&self.page_path(page))
    }
}

impl fmt::Display for ListingFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category(key) => write!(f, "category:{}", key),
            Self::Hot => f.write_str("all:hot"),
            Self::Popular => f.write_str("all:pop"),
        }
    }
}

/// Where a feed is in its walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    pub feed: ListingFeed,

    /// 1-based page number of the page being (or last) fetched
    pub current_page: u32,

    /// Maximum number of listing pages to fetch for this feed
    pub quota: u32,

    pub stopped: bool,
}

impl PaginationState {
    /// Initial state: `Active(1)`
    pub fn new(feed: ListingFeed, quota: u32) -> Self {
        Self {
            feed,
            current_page: 1,
            quota,
            stopped: false,
        }
    }

    /// Returns true if the quota allows another page after the current one
    pub fn has_next(&self) -> bool {
        !self.stopped && self.current_page < self.quota
    }

    /// `Active(page)` → `Active(page + 1)`
    pub fn advance(mut self) -> Self {
        self.current_page += 1;
        self
    }

    /// `Active(page)` → `Stopped`
    pub fn stop(mut self) -> Self {
        self.stopped = true;
        self
    }

    /// URL of the current page
    pub fn page_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        self.feed.page_url(base, self.current_page)
    }
}
