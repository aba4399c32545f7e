//! Category discovery
//!
//! The recipe root page links every category as
//! `/recipe/category/<key>/`. Each distinct key becomes one paginated feed,
//! unless its quota is zero.

use crate::config::QuotaConfig;
use crate::crawler::parser::extract_links;
use crate::state::{CategoryKey, ListingFeed, PaginationState};
use crate::url::{category_key_from_url, is_category_link};
use std::collections::HashSet;
use url::Url;

/// Path of the page listing every category
pub const RECIPE_ROOT_PATH: &str = "/recipe/";

/// Extracts distinct category keys in first-seen order
pub fn extract_category_keys(html: &str, page_url: &Url) -> Vec<CategoryKey> {
    let mut seen = HashSet::new();
    extract_links(html, page_url)
        .iter()
        .filter(|url| is_category_link(url))
        .filter_map(category_key_from_url)
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// Builds the initial pagination state of every feed with a quota of at least one
///
/// Categories come first in discovery order, then the hot and popular feeds.
pub fn seed_feeds(keys: &[CategoryKey], quota: &QuotaConfig) -> Vec<PaginationState> {
    let categories = keys.iter().map(|key| ListingFeed::Category(key.clone()));
    let lists = [ListingFeed::Hot, ListingFeed::Popular];

    categories
        .chain(lists)
        .filter_map(|feed| {
            let pages = quota.for_feed(&feed);
            if pages < 1 {
                tracing::debug!(feed = %feed, "Feed has no quota, skipping");
                None
            } else {
                Some(PaginationState::new(feed, pages))
            }
        })
        .collect()
}
