//! Page content: normalization of rendered markup and the records built from it
//!
//! # Components
//!
//! - `ContentNormalizer`: strips noise, selects the main region, converts to text
//! - `PageRecord`: per-locale content extracted from one URL
//! - `ContentDatabase`: all records of a crawl, keyed by URL

mod normalizer;
mod record;

pub use normalizer::{normalize, ContentNormalizer, NormalizeError, Normalized};
pub use record::{ContentDatabase, LocaleContent, PageRecord};
