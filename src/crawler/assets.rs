//! Image asset resolution
//!
//! Each record yields one task for its main image and one per step image.
//! Target paths depend only on the owning recipe, the image role, the step
//! index and the source extension, so re-harvesting a recipe overwrites the
//! same files instead of piling up copies.

use crate::crawler::fetcher::{FetchContext, Fetcher};
use crate::crawler::frontier::Stage;
use crate::record::RecipeRecord;
use crate::FetchError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use url::Url;

/// Directory under the image root that holds every stored image
pub const IMAGE_DIR: &str = "recipe_images";

const DEFAULT_EXTENSION: &str = ".jpg";
const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    Main,
    Step,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One image to download for a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAssetTask {
    pub owner_recipe_id: String,
    pub role: AssetRole,

    /// Position in the record's step list, for step images
    pub step_index: Option<usize>,

    pub source_url: Url,

    /// Path relative to the image root
    pub target_path: String,

    pub status: AssetStatus,
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Empty image body from {url}")]
    EmptyBody { url: String },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Extension of the source URL's last path segment, dot included
///
/// Falls back to `.jpg` when the segment has no usable extension.
pub fn source_extension(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    match segment.rfind('.') {
        Some(dot) if dot > 0 => {
            let ext = &segment[dot + 1..];
            if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                format!(".{}", ext)
            } else {
                DEFAULT_EXTENSION.to_string()
            }
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Computes where an image is stored, relative to the image root
///
/// - Main: `recipe_images/{id}/main{ext}`
/// - Step: `recipe_images/{id}/step_{index}{ext}`
///
/// An empty owner or a step without an index cannot be addressed; those get a
/// unique `recipe_images/error_{random}{ext}` path so nothing is overwritten.
pub fn target_path(owner: &str, role: AssetRole, step_index: Option<usize>, ext: &str) -> String {
    match (owner.is_empty(), role, step_index) {
        (false, AssetRole::Main, _) => format!("{}/{}/main{}", IMAGE_DIR, owner, ext),
        (false, AssetRole::Step, Some(index)) => {
            format!("{}/{}/step_{}{}", IMAGE_DIR, owner, index, ext)
        }
        _ => format!("{}/error_{:032x}{}", IMAGE_DIR, rand::random::<u128>(), ext),
    }
}

/// Derives the image tasks of a record, main image first
pub fn plan_assets(record: &RecipeRecord) -> Vec<ImageAssetTask> {
    let main = record
        .main_image_ref
        .as_deref()
        .map(|src| (AssetRole::Main, None, src));
    let steps = record
        .steps
        .iter()
        .enumerate()
        .filter_map(|(i, step)| step.image_ref.as_deref().map(|src| (AssetRole::Step, Some(i), src)));

    main.into_iter()
        .chain(steps)
        .filter_map(|(role, step_index, src)| {
            let source_url = match Url::parse(src) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!(recipe_id = %record.recipe_id, src = src, "Skipping unparsable image URL: {}", e);
                    return None;
                }
            };
            let ext = source_extension(&source_url);
            Some(ImageAssetTask {
                owner_recipe_id: record.recipe_id.clone(),
                role,
                step_index,
                target_path: target_path(&record.recipe_id, role, step_index, &ext),
                source_url,
                status: AssetStatus::Pending,
            })
        })
        .collect()
}

/// Per-record join over its image tasks
///
/// Holds the record until every slot has settled, then merges the resolved
/// paths of the successful slots and hands the record out exactly once.
#[derive(Debug)]
pub struct RecordAssembly {
    /// Detail page of the record, sent as `Referer` with every image request
    referer: String,
    inner: Mutex<AssemblyInner>,
}

#[derive(Debug)]
struct AssemblyInner {
    record: Option<RecipeRecord>,
    slots: Vec<ImageAssetTask>,
    remaining: usize,
}

impl RecordAssembly {
    pub fn new(record: RecipeRecord, tasks: Vec<ImageAssetTask>) -> Self {
        let remaining = tasks.len();
        Self {
            referer: record.detail_url.clone(),
            inner: Mutex::new(AssemblyInner {
                record: Some(record),
                slots: tasks,
                remaining,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AssemblyInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn referer(&self) -> &str {
        &self.referer
    }

    /// Number of slots still pending
    pub fn remaining(&self) -> usize {
        self.lock().remaining
    }

    /// Settles one slot
    ///
    /// Returns the finished record when this was the last pending slot. A slot
    /// that already settled is left untouched.
    pub fn settle(&self, slot: usize, status: AssetStatus) -> Option<RecipeRecord> {
        let mut inner = self.lock();
        let task = inner.slots.get_mut(slot)?;
        if task.status != AssetStatus::Pending || status == AssetStatus::Pending {
            return None;
        }
        task.status = status;
        inner.remaining -= 1;

        if inner.remaining > 0 {
            return None;
        }

        let mut record = inner.record.take()?;
        for task in inner.slots.iter().filter(|t| t.status == AssetStatus::Succeeded) {
            match (task.role, task.step_index) {
                (AssetRole::Main, _) => {
                    record.main_image_resolved_path = Some(task.target_path.clone());
                }
                (AssetRole::Step, Some(index)) => {
                    if let Some(step) = record.steps.get_mut(index) {
                        step.resolved_path = Some(task.target_path.clone());
                    }
                }
                (AssetRole::Step, None) => {}
            }
        }
        Some(record)
    }
}

/// Downloads one image and writes it under the image root
///
/// The request carries the recipe page as `Referer`; the site refuses
/// hot-linked images without it.
pub async fn store_asset(
    fetcher: &Fetcher,
    image_root: &Path,
    task: &ImageAssetTask,
    referer: &str,
) -> Result<PathBuf, AssetError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(IMAGE_ACCEPT));
    match HeaderValue::from_str(referer) {
        Ok(value) => {
            headers.insert(REFERER, value);
        }
        Err(e) => tracing::debug!(
            url = %task.source_url,
            recipe_id = %task.owner_recipe_id,
            "Sending image request without Referer {:?}: {}",
            referer,
            e
        ),
    }

    let context = FetchContext::owned_by(Stage::ImageAsset, task.owner_recipe_id.clone());
    let page = fetcher.fetch(&task.source_url, headers, &context).await?;

    if page.body.is_empty() {
        return Err(AssetError::EmptyBody {
            url: task.source_url.to_string(),
        });
    }

    let destination = image_root.join(&task.target_path);
    let io_error = |source| AssetError::Io {
        path: destination.display().to_string(),
        source,
    };

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    tokio::fs::write(&destination, &page.body)
        .await
        .map_err(io_error)?;

    Ok(destination)
}
