//! Sitelingo: a scoped, multilingual site crawler
//!
//! This crate crawls a single site from a seed URL, restricted to an allow list of
//! URL prefixes, captures each page in every locale the page offers, normalizes the
//! markup to plain text and turns it into structured records keyed by URL.

pub mod config;
pub mod content;
pub mod crawler;
pub mod output;
pub mod state;
pub mod structurer;
pub mod url;

use thiserror::Error;

/// Main error type for Sitelingo operations
///
/// Every variant except `Output` is a setup failure raised before the first
/// page is fetched. `Output` is raised when the final results file cannot be
/// written.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Structuring service error: {0}")]
    Structure(#[from] structurer::StructureError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Sitelingo operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use content::{ContentDatabase, LocaleContent, PageRecord};
pub use crawler::{run_crawl, Coordinator, CrawlOutcome};
pub use url::{canonicalize_url, extract_domain, CrawlTarget};
