use crate::{UrlError, UrlResult};
use url::Url;

/// Query parameters that only carry tracking state and never change page content
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "mc_cid", "_ga"];

/// Canonicalizes a URL so that equivalent spellings share one frontier key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL (surrounding whitespace ignored); reject if malformed
/// 2. Accept only http and https
/// 3. Lowercase the host (done by the parser for special schemes)
/// 4. Normalize path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Remove trailing slash (except for root /)
/// 5. Remove fragment
/// 6. Remove tracking query parameters, sort the rest, drop an empty query
///
/// # Examples
///
/// ```
/// use sitelingo::url::canonicalize_url;
///
/// let url = canonicalize_url("https://SITE.example/programs/?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://site.example/programs");
/// ```
pub fn canonicalize_url(url_str: &str) -> UrlResult<Url> {
    let mut url = fetch_url(url_str)?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Parses the URL a page is actually requested from
///
/// Only the fragment is removed. The path and query stay exactly as written,
/// because `/docs/` and `/docs`, or `?print` and `?print=`, may be different
/// resources to the server even though they share a canonical key.
pub fn fetch_url(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Returns the scope key of a canonical URL: the URL without its query string
///
/// Admission compares paths only, so `?page=2` never changes whether a URL is
/// in scope.
pub fn scope_key(url: &Url) -> String {
    let mut stripped = url.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    stripped.to_string()
}

/// Normalizes a URL path by removing dot segments, empty segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
