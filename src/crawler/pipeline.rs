//! Per-page extraction
//!
//! For one URL the pipeline loads the page, captures it in every locale it
//! offers, normalizes each capture to plain text and asks the structuring
//! service to turn the text into a record slot.

use crate::config::{Config, LocaleConfig};
use crate::content::{ContentNormalizer, LocaleContent, PageRecord};
use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::crawler::pacing::{settle, SettlePolicy, Sleeper, TokioSleeper};
use crate::crawler::parser::has_locale_control;
use crate::structurer::{parse_structured, StructureError, Structurer};
use scraper::Selector;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Reasons a page produced no record
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Navigation failed: {0}")]
    Navigation(FetchError),

    #[error("Page did not finish within {0}s")]
    Timeout(u64),

    #[error("Pipeline setup failed: {0}")]
    Setup(String),
}

/// Partial failures observed while building a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionNotes {
    pub degraded_normalizations: usize,
    pub raw_outputs: usize,
    pub absent_locales: usize,
}

/// A finished record plus what went wrong on the way
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub record: PageRecord,
    pub notes: ExtractionNotes,
}

/// Turns a URL into a `PageRecord`
pub struct ExtractionPipeline {
    structurer: Arc<dyn Structurer>,
    locales: LocaleConfig,
    locale_control: Selector,
    settle_policy: SettlePolicy,
    sleeper: Arc<dyn Sleeper>,
    normalizer: ContentNormalizer,
    structure_timeout: Duration,
}

impl ExtractionPipeline {
    /// Creates a pipeline
    ///
    /// # Arguments
    ///
    /// * `structurer` - Service that converts normalized text into JSON
    /// * `locales` - Default key and the locales captured on switchable pages
    /// * `locale_selector` - CSS selector of the locale-switch control
    pub fn new(
        structurer: Arc<dyn Structurer>,
        locales: LocaleConfig,
        locale_selector: &str,
    ) -> Result<Self, PipelineError> {
        let locale_control = Selector::parse(locale_selector)
            .map_err(|_| PipelineError::Setup(format!("invalid selector {}", locale_selector)))?;
        let normalizer =
            ContentNormalizer::try_new().map_err(|e| PipelineError::Setup(e.to_string()))?;

        Ok(Self {
            structurer,
            locales,
            locale_control,
            settle_policy: SettlePolicy::default(),
            sleeper: Arc::new(TokioSleeper),
            normalizer,
            structure_timeout: Duration::from_secs(60),
        })
    }

    pub fn from_config(
        config: &Config,
        structurer: Arc<dyn Structurer>,
    ) -> Result<Self, PipelineError> {
        Ok(Self::new(
            structurer,
            config.locales.clone(),
            &config.fetcher.locale_selector,
        )?
        .with_settle_policy(SettlePolicy::from_config(&config.fetcher))
        .with_structure_timeout(Duration::from_secs(config.structurer.timeout_secs)))
    }

    pub fn with_settle_policy(mut self, policy: SettlePolicy) -> Self {
        self.settle_policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_structure_timeout(mut self, timeout: Duration) -> Self {
        self.structure_timeout = timeout;
        self
    }

    /// Extracts one page
    ///
    /// `location` is requested from the fetcher; the record is stored under
    /// the canonical `url`. Only a failed load or first capture is an error.
    /// Any failure after that leaves the affected locale slot empty and is
    /// counted in the notes.
    pub async fn extract<F>(
        &self,
        url: &str,
        location: &Url,
        fetcher: &mut F,
    ) -> Result<ExtractedPage, PipelineError>
    where
        F: PageFetcher + ?Sized,
    {
        fetcher.load(location).await.map_err(PipelineError::Navigation)?;
        let markup = settle(fetcher, &self.settle_policy, self.sleeper.as_ref())
            .await
            .map_err(PipelineError::Navigation)?;

        let mut record = PageRecord::new(url);
        let mut notes = ExtractionNotes::default();

        if has_locale_control(&markup, &self.locale_control) {
            tracing::debug!(url = %url, "locale switch found");

            for locale in &self.locales.supported {
                let content = match self.capture_locale(fetcher, &locale.code).await {
                    Ok(captured) => self.convert(url, &locale.key, &captured, &mut notes).await,
                    Err(e) => {
                        tracing::warn!(
                            url = %url,
                            stage = "locale",
                            locale = %locale.code,
                            error = %e,
                            "could not capture locale"
                        );
                        None
                    }
                };

                if content.is_none() {
                    notes.absent_locales += 1;
                }
                record.set_locale(locale.key.as_str(), content);
            }
        } else {
            let key = self.locales.default_key.as_str();
            let content = self.convert(url, key, &markup, &mut notes).await;
            if content.is_none() {
                notes.absent_locales += 1;
            }
            record.set_locale(key, content);
        }

        Ok(ExtractedPage { record, notes })
    }

    async fn capture_locale<F>(&self, fetcher: &mut F, code: &str) -> Result<String, FetchError>
    where
        F: PageFetcher + ?Sized,
    {
        fetcher.switch_locale(code).await?;
        settle(fetcher, &self.settle_policy, self.sleeper.as_ref()).await
    }

    /// Normalizes and structures one capture
    async fn convert(
        &self,
        url: &str,
        key: &str,
        markup: &str,
        notes: &mut ExtractionNotes,
    ) -> Option<LocaleContent> {
        let normalized = self.normalizer.normalize(markup);
        if normalized.is_degraded() {
            notes.degraded_normalizations += 1;
        }
        let text = normalized.into_text();

        let output = match self.structure(&text, url).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(url = %url, stage = "structure", locale = key, error = %e, "structuring failed");
                return None;
            }
        };

        let content = parse_structured(&output);
        if !content.is_structured() {
            notes.raw_outputs += 1;
            tracing::warn!(url = %url, stage = "structure", locale = key, "output is not JSON, keeping raw text");
        }
        Some(content)
    }

    /// Calls the structuring service under the structuring timeout
    async fn structure(&self, text: &str, url: &str) -> Result<String, StructureError> {
        tokio::time::timeout(self.structure_timeout, self.structurer.structure(text, url))
            .await
            .map_err(|_| StructureError::Timeout(self.structure_timeout))?
    }
}
