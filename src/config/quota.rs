//! Quota override file
//!
//! A flat JSON object such as
//!
//! ```json
//! { "category._default": 5, "category.jiachangcai": 10, "all.hot": 2, "all.pop": 0 }
//! ```
//!
//! Values replace the matching entries of the `[quota]` table. Negative values
//! count as zero.

use crate::config::types::QuotaConfig;
use crate::ConfigError;
use std::collections::BTreeMap;
use std::path::Path;

const CATEGORY_PREFIX: &str = "category.";
const DEFAULT_KEY: &str = "_default";

/// Reads a quota file into its raw key/value table
pub fn load_quota_file(path: &Path) -> Result<BTreeMap<String, i64>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| ConfigError::QuotaFile {
        path: path.display().to_string(),
        source,
    })
}

/// Applies quota file entries on top of the configured quotas
pub fn apply_overrides(quota: &mut QuotaConfig, overrides: &BTreeMap<String, i64>) {
    for (key, value) in overrides {
        let value = u32::try_from((*value).max(0)).unwrap_or(u32::MAX);

        match key.as_str() {
            "all.hot" => quota.hot = value,
            "all.pop" => quota.pop = value,
            "timeline" => quota.timeline = value,
            other => match other.strip_prefix(CATEGORY_PREFIX) {
                Some(DEFAULT_KEY) => quota.default = value,
                Some(category) if !category.is_empty() => {
                    quota.categories.insert(category.to_string(), value);
                }
                _ => tracing::warn!(key = %key, "Ignoring unknown quota file entry"),
            },
        }
    }
}
