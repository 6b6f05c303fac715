//! Crawler module for page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The page fetcher abstraction and its HTTP implementation
//! - HTML inspection for links and the locale switch
//! - Per-page extraction across locales
//! - Pacing and settle waits
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod pacing;
mod parser;
mod pipeline;

pub use coordinator::{persist, run_crawl, Coordinator, CrawlOutcome};
pub use fetcher::{build_http_client, FetchError, HttpPageFetcher, PageFetcher};
pub use pacing::{settle, Pacer, SettlePolicy, Sleeper, TokioSleeper};
pub use parser::{extract_links, has_locale_control, locale_options};
pub use pipeline::{ExtractedPage, ExtractionNotes, ExtractionPipeline, PipelineError};
