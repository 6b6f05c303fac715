//! HTML inspection for the crawl loop
//!
//! This module reads rendered markup to find:
//! - Outbound links to feed the admission filter
//! - The locale-switch control and the locale values it offers

use scraper::{Html, Selector};
use url::Url;

/// Extracts all followable links from rendered markup
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only anchors
/// - Anything that does not resolve to http(s)
///
/// # Arguments
///
/// * `html` - The rendered markup
/// * `base_url` - The URL the markup was loaded from
///
/// # Returns
///
/// Absolute URLs in document order (duplicates are left to the frontier)
pub fn extract_links(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL
///
/// Returns None for special schemes, fragment-only links, invalid URLs and
/// non-HTTP(S) results.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    // Same-page anchors
    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// True when the markup contains the locale-switch control
pub fn has_locale_control(html: &str, control: &Selector) -> bool {
    Html::parse_document(html).select(control).next().is_some()
}

/// Values the locale-switch control offers
///
/// Reads `<option value>` children of the control; a control without options
/// (for example a link list) yields nothing.
pub fn locale_options(html: &str, control: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(option_selector) = Selector::parse("option[value]") else {
        return Vec::new();
    };

    document
        .select(control)
        .flat_map(|element| element.select(&option_selector).collect::<Vec<_>>())
        .filter_map(|option| option.value().attr("value"))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}
