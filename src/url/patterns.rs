//! Site path patterns
//!
//! Recipe detail pages live at `/recipe/<digits>/`, category listings at
//! `/recipe/category/<key>/<page>/`.

use crate::state::CategoryKey;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Marker that identifies category links
pub const CATEGORY_MARKER: &str = "/category/";

static DETAIL_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/recipe/(\d+)/?$").expect("detail path regex is valid") // Static pattern
});

/// Returns true if the URL points at a recipe detail page
///
/// The path must end in a numeric recipe id and must not go through a
/// category listing.
pub fn is_detail_link(url: &Url) -> bool {
    let path = url.path();
    !path.contains(CATEGORY_MARKER) && DETAIL_PATH.is_match(path)
}

/// Extracts the numeric recipe id from a detail URL
///
/// This depends on the path only, so re-fetching the same page always
/// yields the same id.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use recipe_harvest::url::recipe_id_from_url;
///
/// let url = Url::parse("https://m.example.com/recipe/531604/").unwrap();
/// assert_eq!(recipe_id_from_url(&url), Some("531604".to_string()));
/// ```
pub fn recipe_id_from_url(url: &Url) -> Option<String> {
    DETAIL_PATH
        .captures(url.path())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Returns true if the URL is a category link
pub fn is_category_link(url: &Url) -> bool {
    url.path().contains("/recipe/category/")
}

/// Projects a category URL to the path segment following the marker
pub fn category_key_from_url(url: &Url) -> Option<CategoryKey> {
    let path = url.path();
    let start = path.find(CATEGORY_MARKER)? + CATEGORY_MARKER.len();
    path[start..]
        .split('/')
        .next()
        .and_then(CategoryKey::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_detail_link_with_and_without_slash() {
        assert!(is_detail_link(&url("https://m.example.com/recipe/123/")));
        assert!(is_detail_link(&url("https://m.example.com/recipe/123")));
    }

    #[test]
    fn test_category_links_are_not_detail_links() {
        assert!(!is_detail_link(&url(
            "https://m.example.com/recipe/category/recipe/123/"
        )));
        assert!(!is_detail_link(&url("https://m.example.com/recipe/category/rc/2/")));
    }

    #[test]
    fn test_non_numeric_paths_rejected() {
        assert!(!is_detail_link(&url("https://m.example.com/recipe/")));
        assert!(!is_detail_link(&url("https://m.example.com/recipe/abc/")));
        assert!(!is_detail_link(&url("https://m.example.com/recipe/all/hot/1/x")));
    }

    #[test]
    fn test_recipe_id_is_stable() {
        let a = recipe_id_from_url(&url("https://m.example.com/recipe/987/"));
        let b = recipe_id_from_url(&url("https://m.example.com/recipe/987/"));
        assert_eq!(a, Some("987".to_string()));
        assert_eq!(a, b);
    }

    #[test]
    fn test_recipe_id_ignores_query() {
        assert_eq!(
            recipe_id_from_url(&url("https://m.example.com/recipe/55/?from=timeline")),
            Some("55".to_string())
        );
    }

    #[test]
    fn test_recipe_id_missing() {
        assert_eq!(recipe_id_from_url(&url("https://m.example.com/about/")), None);
    }

    #[test]
    fn test_category_key_projection() {
        let key = category_key_from_url(&url("https://m.example.com/recipe/category/jiachangcai/"));
        assert_eq!(key.unwrap().as_str(), "jiachangcai");

        let key = category_key_from_url(&url("https://m.example.com/recipe/category/rc/3/"));
        assert_eq!(key.unwrap().as_str(), "rc");
    }

    #[test]
    fn test_category_key_empty_segment() {
        assert!(category_key_from_url(&url("https://m.example.com/recipe/category/")).is_none());
        assert!(category_key_from_url(&url("https://m.example.com/recipe/")).is_none());
    }

    #[test]
    fn test_is_category_link() {
        assert!(is_category_link(&url("https://m.example.com/recipe/category/rc/")));
        assert!(!is_category_link(&url("https://m.example.com/recipe/12/")));
    }
}
