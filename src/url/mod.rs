//! URL handling module for Sitelingo
//!
//! This module provides URL canonicalization, domain extraction, and the crawl
//! scope (admission filter) built on top of them.

mod domain;
mod normalize;
mod scope;

pub use domain::extract_domain;
pub use normalize::{canonicalize_url, fetch_url, scope_key};
pub use scope::{ancestor_keys, CrawlTarget};
