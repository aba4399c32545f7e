//! Configuration module for Recipe-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, plus the optional JSON quota override file.
//!
//! # Example
//!
//! ```no_run
//! use recipe_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting {} with {} workers", config.site.base_url, config.crawler.workers);
//! ```

mod parser;
mod quota;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, OutputConfig, QuotaConfig, SiteConfig, DEFAULT_USER_AGENT,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use quota::{apply_overrides, load_quota_file};
