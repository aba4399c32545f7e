//! URL handling module for Recipe-Harvest
//!
//! This module provides URL normalization for the visited set, host
//! extraction for politeness slots, and the site's path patterns.

mod domain;
mod normalize;
mod patterns;

pub use domain::extract_domain;
pub use normalize::{dedup_key, normalize_url};
pub use patterns::{
    category_key_from_url, is_category_link, is_detail_link, recipe_id_from_url, CATEGORY_MARKER,
};
