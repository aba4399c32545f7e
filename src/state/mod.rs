//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PaginationState`: where one listing feed is in its page walk
//! - `HostState`: per-host politeness timing used by the scheduler

mod host_state;
mod pagination_state;

pub use host_state::HostState;
pub use pagination_state::{CategoryKey, ListingFeed, PaginationState};
