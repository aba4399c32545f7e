//! Link extraction shared by the discovery and listing stages
//!
//! Both stages need the same thing from a page: every `<a href>` resolved
//! against the page URL, with the non-navigational schemes filtered out. The
//! callers then keep the links matching their own path pattern.

use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector is valid")); // Static selector

/// Extracts all followable links from an HTML document, in document order
///
/// **Excluded:**
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links
/// - Anything that is not HTTP(S) after resolution
///
/// # Example
///
/// ```
/// use recipe_harvest::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<a href="/recipe/12/">Dumplings</a><a href="javascript:void(0)">x</a>"#;
/// let base = Url::parse("https://m.example.com/recipe/").unwrap();
/// let links = extract_links(html, &base);
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].as_str(), "https://m.example.com/recipe/12/");
/// ```
pub fn extract_links(html: &str, base_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    links_in(&document, base_url)
}

/// Same as [`extract_links`] for an already parsed document
pub fn links_in(document: &Html, base_url: &Url) -> Vec<Url> {
    document
        .select(&ANCHOR)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

/// Resolves an href against the page URL
///
/// Returns None if the link should not be followed.
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://m.example.com/recipe/category/rc/").unwrap()
    }

    #[test]
    fn test_absolute_and_relative_links() {
        let html = r#"
            <a href="https://other.example.com/recipe/1/">a</a>
            <a href="/recipe/2/">b</a>
            <a href="3/">c</a>
        "#;
        let links = extract_links(html, &base_url());
        let links: Vec<&str> = links.iter().map(Url::as_str).collect();
        assert_eq!(
            links,
            vec![
                "https://other.example.com/recipe/1/",
                "https://m.example.com/recipe/2/",
                "https://m.example.com/recipe/category/rc/3/",
            ]
        );
    }

    #[test]
    fn test_skips_non_navigational_links() {
        let html = r##"
            <a href="javascript:void(0)">js</a>
            <a href="JavaScript:void(0)">js</a>
            <a href="mailto:cook@example.com">mail</a>
            <a href="tel:+861234">call</a>
            <a href="data:text/html,hi">data</a>
            <a href="#top">top</a>
            <a href="  ">blank</a>
            <a>no href</a>
        "##;
        assert!(extract_links(html, &base_url()).is_empty());
    }

    #[test]
    fn test_skips_other_schemes() {
        assert!(resolve_link("ftp://m.example.com/file", &base_url()).is_none());
    }

    #[test]
    fn test_keeps_document_order_and_duplicates() {
        let html = r#"<a href="/recipe/9/">x</a><a href="/recipe/8/">y</a><a href="/recipe/9/">z</a>"#;
        let links = extract_links(html, &base_url());
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].path(), "/recipe/9/");
        assert_eq!(links[1].path(), "/recipe/8/");
    }
}
