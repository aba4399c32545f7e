//! Timeline API walker
//!
//! `GET {base}/ajax.php?ac=m&op=getTimeLineList&page=N` returns the site's
//! activity feed as JSON:
//!
//! ```json
//! {"data": [{"type": "recipe", "remark": "菜谱", "wapurl": "https://m.example.com/recipe/1/"}]}
//! ```
//!
//! Only recipe entries tagged "菜谱" are followed. The walk continues while a
//! page has entries and the timeline quota allows another page.

use crate::url::is_detail_link;
use crate::ParseFailure;
use serde::Deserialize;
use url::Url;

const TIMELINE_PATH: &str = "/ajax.php";
const RECIPE_TYPE: &str = "recipe";
const RECIPE_REMARK: &str = "菜谱";

#[derive(Debug, Deserialize)]
struct TimelinePayload {
    #[serde(default)]
    data: Option<Vec<TimelineEntry>>,
}

#[derive(Debug, Deserialize)]
struct TimelineEntry {
    #[serde(rename = "type", default)]
    kind: Option<String>,

    #[serde(default)]
    remark: Option<String>,

    #[serde(default)]
    wapurl: Option<String>,
}

impl TimelineEntry {
    fn is_recipe(&self) -> bool {
        self.kind.as_deref() == Some(RECIPE_TYPE) && self.remark.as_deref() == Some(RECIPE_REMARK)
    }
}

/// What one timeline page produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineOutcome {
    pub detail_links: Vec<Url>,

    /// Page to request next, if any
    pub next_page: Option<u32>,
}

/// URL of a timeline page
pub fn timeline_url(base: &Url, page: u32) -> Result<Url, url::ParseError> {
    let mut url = base.join(TIMELINE_PATH)?;
    url.query_pairs_mut()
        .append_pair("ac", "m")
        .append_pair("op", "getTimeLineList")
        .append_pair("page", &page.to_string());
    Ok(url)
}

/// Parses one timeline page
///
/// An entry whose link does not point at a recipe detail page is skipped.
pub fn parse_timeline(body: &[u8], url: &Url, page: u32, quota: u32) -> Result<TimelineOutcome, ParseFailure> {
    let payload: TimelinePayload =
        serde_json::from_slice(body).map_err(|source| ParseFailure::Timeline {
            url: url.to_string(),
            source,
        })?;

    let entries = payload.data.unwrap_or_default();

    let detail_links = entries
        .iter()
        .filter(|entry| entry.is_recipe())
        .filter_map(|entry| entry.wapurl.as_deref())
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| url.join(href).ok())
        .filter(|link| {
            let keep = is_detail_link(link);
            if !keep {
                tracing::debug!(url = %link, "Timeline entry is not a recipe page");
            }
            keep
        })
        .collect();

    let next_page = (!entries.is_empty() && page < quota).then_some(page + 1);

    Ok(TimelineOutcome {
        detail_links,
        next_page,
    })
}
