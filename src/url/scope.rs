//! Crawl scope: which discovered URLs may enter the frontier

use crate::url::{canonicalize_url, extract_domain, fetch_url, scope_key};
use crate::{UrlError, UrlResult};
use std::collections::HashSet;
use url::Url;

/// The site being crawled and the part of it that is in scope
///
/// Immutable once built. Allow-list entries are stored in canonical scope-key
/// form so that admission is a plain set lookup per path ancestor.
#[derive(Debug, Clone)]
pub struct CrawlTarget {
    base_url: Url,
    seed: Url,
    domain: String,
    allow_list: HashSet<String>,
}

impl CrawlTarget {
    /// Builds a target from a seed URL and allow-list entries
    ///
    /// Allow-list entries that cannot be parsed are an error; an empty allow
    /// list makes the whole domain admissible.
    pub fn new<I, S>(base_url: &str, allow_list: I) -> UrlResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let seed = fetch_url(base_url)?;
        let base_url = canonicalize_url(base_url)?;
        let domain = extract_domain(&base_url).ok_or(UrlError::MissingDomain)?;

        let allow_list = allow_list
            .into_iter()
            .map(|entry| canonicalize_url(entry.as_ref()).map(|url| scope_key(&url)))
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(Self {
            base_url,
            seed,
            domain,
            allow_list,
        })
    }

    /// The canonical seed URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The seed as written, without its fragment; this is what gets requested
    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Host (and explicit port) every crawled URL must share
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Canonical allow-list entries
    pub fn allow_list(&self) -> &HashSet<String> {
        &self.allow_list
    }

    /// True when the whole domain is in scope
    pub fn is_domain_wide(&self) -> bool {
        self.allow_list.is_empty()
    }

    /// Decides whether a discovered URL may be crawled
    ///
    /// Fails closed: empty, unparsable, non-http(s) and cross-domain candidates
    /// are rejected. With a non-empty allow list, the candidate's path or one of
    /// its ancestor directories (down to the site root) must equal an entry.
    pub fn is_admissible(&self, candidate: &str) -> bool {
        if candidate.trim().is_empty() {
            return false;
        }

        let url = match canonicalize_url(candidate) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(candidate, error = %e, "rejecting unparsable URL");
                return false;
            }
        };

        self.admits(&url)
    }

    /// Admission check for an already canonical URL
    pub fn admits(&self, url: &Url) -> bool {
        if extract_domain(url).as_deref() != Some(self.domain.as_str()) {
            return false;
        }

        if self.allow_list.is_empty() {
            return true;
        }

        ancestor_keys(url)
            .iter()
            .any(|key| self.allow_list.contains(key))
    }
}

/// Lists the scope keys of a URL and every ancestor directory, deepest first
///
/// `https://site.example/a/b` yields `https://site.example/a/b`,
/// `https://site.example/a` and `https://site.example/`. Ancestors are cut on
/// whole segments only.
pub fn ancestor_keys(url: &Url) -> Vec<String> {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let origin = match extract_domain(url) {
        Some(domain) => format!("{}://{}", url.scheme(), domain),
        None => return Vec::new(),
    };

    (0..=segments.len())
        .rev()
        .map(|depth| format!("{}/{}", origin, segments[..depth].join("/")))
        .collect()
}
