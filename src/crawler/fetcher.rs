//! Page fetcher adapter
//!
//! The crawl loop and extraction pipeline talk to a rendering backend only
//! through the `PageFetcher` trait. This module also provides
//! `HttpPageFetcher`, a backend that loads pages over plain HTTP and switches
//! locale by re-requesting the page with the locale as query parameter and
//! `Accept-Language`.

use crate::config::FetcherConfig;
use crate::crawler::parser::{extract_links, locale_options};
use async_trait::async_trait;
use reqwest::header::ACCEPT_LANGUAGE;
use reqwest::Client;
use scraper::Selector;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised by a page fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("No page is loaded")]
    NoPageLoaded,

    #[error("Locale {0} is not offered by the page")]
    LocaleUnavailable(String),

    #[error("Invalid locale selector: {0}")]
    InvalidSelector(String),
}

/// Capabilities the crawler needs from a rendering backend
///
/// A fetcher holds one page at a time. `switch_locale`, `current_markup` and
/// `discover_links` act on the page from the last successful `load`.
#[async_trait]
pub trait PageFetcher: Send {
    /// Navigates to a URL
    async fn load(&mut self, url: &Url) -> Result<(), FetchError>;

    /// Switches the loaded page to another locale
    async fn switch_locale(&mut self, code: &str) -> Result<(), FetchError>;

    /// Current rendered markup of the loaded page
    async fn current_markup(&mut self) -> Result<String, FetchError>;

    /// Absolute URLs of the links on the loaded page
    async fn discover_links(&mut self) -> Result<Vec<String>, FetchError>;

    /// Releases the backend session
    async fn close(&mut self) -> Result<(), FetchError>;
}

/// Builds the HTTP client used for page loads
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

#[derive(Debug)]
struct LoadedPage {
    /// URL passed to `load`; locale variants are derived from it
    origin: Url,
    /// URL of the response currently held (after redirects)
    current: Url,
    markup: String,
    /// Markup of the page as first loaded; it holds the locale control
    origin_markup: String,
}

/// `PageFetcher` over plain HTTP
pub struct HttpPageFetcher {
    client: Client,
    locale_control: Selector,
    locale_param: String,
    accept_language: String,
    page: Option<LoadedPage>,
}

impl HttpPageFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let locale_control = Selector::parse(&config.locale_selector)
            .map_err(|_| FetchError::InvalidSelector(config.locale_selector.clone()))?;

        Ok(Self {
            client: build_http_client(config)?,
            locale_control,
            locale_param: config.locale_param.clone(),
            accept_language: config.accept_language.clone(),
            page: None,
        })
    }

    fn page(&self) -> Result<&LoadedPage, FetchError> {
        self.page.as_ref().ok_or(FetchError::NoPageLoaded)
    }

    /// GETs a URL, returning the final URL and body
    async fn get(&self, url: &Url, accept_language: &str) -> Result<(Url, String), FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT_LANGUAGE, accept_language)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await?;
        Ok((final_url, body))
    }

    fn locale_url(&self, origin: &Url, code: &str) -> Url {
        let mut url = origin.clone();
        let kept: Vec<(String, String)> = origin
            .query_pairs()
            .filter(|(key, _)| key != self.locale_param.as_str())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(&self.locale_param, code);
        url
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn load(&mut self, url: &Url) -> Result<(), FetchError> {
        // A failed load must not leave the previous page behind
        self.page = None;

        let (current, markup) = self.get(url, &self.accept_language).await?;
        tracing::debug!(url = %url, bytes = markup.len(), "page loaded");

        self.page = Some(LoadedPage {
            origin: url.clone(),
            current,
            origin_markup: markup.clone(),
            markup,
        });
        Ok(())
    }

    async fn switch_locale(&mut self, code: &str) -> Result<(), FetchError> {
        let page = self.page()?;

        if !locale_options(&page.origin_markup, &self.locale_control)
            .iter()
            .any(|option| option == code)
        {
            return Err(FetchError::LocaleUnavailable(code.to_string()));
        }

        let origin = page.origin.clone();
        let target = self.locale_url(&origin, code);
        let (current, markup) = self.get(&target, code).await?;
        tracing::debug!(url = %origin, locale = code, "locale switched");

        let origin_markup = self.page.take().map(|page| page.origin_markup).unwrap_or_default();
        self.page = Some(LoadedPage {
            origin,
            current,
            markup,
            origin_markup,
        });
        Ok(())
    }

    async fn current_markup(&mut self) -> Result<String, FetchError> {
        Ok(self.page()?.markup.clone())
    }

    async fn discover_links(&mut self) -> Result<Vec<String>, FetchError> {
        let page = self.page()?;
        Ok(extract_links(&page.markup, &page.current))
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        self.page = None;
        Ok(())
    }
}
