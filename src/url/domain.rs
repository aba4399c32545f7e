use url::Url;

/// Extracts the lowercase host of a URL, including a non-default port
///
/// The port is kept so that two servers on the same address (as in tests)
/// get independent politeness slots.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use recipe_harvest::url::extract_domain;
///
/// let url = Url::parse("https://M.Example.com/recipe/").unwrap();
/// assert_eq!(extract_domain(&url), Some("m.example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/recipe/").unwrap();
/// assert_eq!(extract_domain(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_image_host_is_separate() {
        let page = Url::parse("https://m.meishichina.com/recipe/1/").unwrap();
        let image = Url::parse("https://i3.meishichina.com/atta/step.jpg").unwrap();
        assert_ne!(extract_domain(&page), extract_domain(&image));
    }

    #[test]
    fn test_default_port_is_dropped() {
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_no_host() {
        let url = Url::parse("data:text/plain,hello").unwrap();
        assert_eq!(extract_domain(&url), None);
    }
}
