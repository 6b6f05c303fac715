use url::Url;

/// Extracts the crawl domain from a URL
///
/// The domain is the lowercase host, followed by `:port` when the URL carries an
/// explicit non-default port. Two URLs belong to the same site only when their
/// domains are equal.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitelingo::url::extract_domain;
///
/// let url = Url::parse("https://Site.Example/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("site.example".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(extract_domain(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}
