//! Per-feed pagination
//!
//! ```text
//! Active(page) --redirected------------------------> Stopped
//! Active(page) --no detail links-------------------> Stopped
//! Active(page) --detail links, page == quota-------> Stopped
//! Active(page) --detail links, page <  quota-------> Active(page + 1)
//! Active(page) --fetch failed, page <  quota-------> Active(page + 1)
//! Active(page) --fetch failed, page == quota-------> Stopped
//! ```
//!
//! The site answers out-of-range page numbers by redirecting back to an
//! earlier page, so a redirect ends the feed. A page that cannot be fetched
//! at all is skipped; the next page number is still requested.

use crate::crawler::fetcher::FetchedPage;
use crate::crawler::parser::extract_links;
use crate::state::PaginationState;
use crate::url::is_detail_link;
use crate::FetchError;
use std::fmt;
use url::Url;

/// Why a feed stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Redirected,
    NoRecipes,
    QuotaReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Redirected => "redirected",
            Self::NoRecipes => "no recipes on page",
            Self::QuotaReached => "quota reached",
        };
        f.write_str(reason)
    }
}

/// What processing one listing page produced
#[derive(Debug, Clone)]
pub struct ListingOutcome {
    /// Detail pages linked from the listing, in page order
    pub detail_links: Vec<Url>,

    /// State after the transition; advanced to the next page unless stopped
    pub state: PaginationState,

    pub stop_reason: Option<StopReason>,
}

impl ListingOutcome {
    /// True if the next listing page should be requested
    pub fn has_next(&self) -> bool {
        self.stop_reason.is_none()
    }
}

/// Applies one listing response to a feed's state
///
/// `page_url` is the URL the body was served from, used to resolve links.
pub fn transition(state: PaginationState, redirected: bool, html: &str, page_url: &Url) -> ListingOutcome {
    if redirected {
        return stopped(state, Vec::new(), StopReason::Redirected);
    }

    let detail_links: Vec<Url> = extract_links(html, page_url)
        .into_iter()
        .filter(is_detail_link)
        .collect();

    if detail_links.is_empty() {
        return stopped(state, detail_links, StopReason::NoRecipes);
    }

    if state.has_next() {
        ListingOutcome {
            detail_links,
            state: state.advance(),
            stop_reason: None,
        }
    } else {
        stopped(state, detail_links, StopReason::QuotaReached)
    }
}

/// Applies a fetched listing page to a feed's state
///
/// A body that is not UTF-8 yields no links and stops the feed.
pub fn on_listing_page(state: PaginationState, page: &FetchedPage) -> ListingOutcome {
    let html = page.text().unwrap_or_default();
    transition(state, page.was_redirected(), html, &page.final_url)
}

/// Applies a failed listing fetch to a feed's state
///
/// Redirect loops end the feed like any other redirect.
pub fn on_fetch_failure(state: PaginationState, error: &FetchError) -> ListingOutcome {
    if error.is_redirect() {
        return stopped(state, Vec::new(), StopReason::Redirected);
    }
    if state.has_next() {
        ListingOutcome {
            detail_links: Vec::new(),
            state: state.advance(),
            stop_reason: None,
        }
    } else {
        stopped(state, Vec::new(), StopReason::QuotaReached)
    }
}

fn stopped(state: PaginationState, detail_links: Vec<Url>, reason: StopReason) -> ListingOutcome {
    ListingOutcome {
        detail_links,
        state: state.stop(),
        stop_reason: Some(reason),
    }
}
