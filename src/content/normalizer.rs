//! Markup to plain text conversion
//!
//! The normalizer picks the main content region of a page and converts it to
//! Markdown with `htmd`, skipping presentation noise. Lines are never wrapped
//! and text is kept in its original script.

use htmd::HtmlToMarkdown;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// Elements whose subtrees never contribute page content
const NOISE_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "nav", "noscript", "template", "head",
];

/// Main-content candidates in priority order; the first match wins
const MAIN_CONTENT_SELECTORS: &[&str] = &["main", "article", "div.content", "div#content"];

/// Errors that prevent a clean conversion
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid content selector '{0}'")]
    Selector(String),

    #[error("no text content found in {0} bytes of markup")]
    Empty(usize),

    #[error("markdown conversion failed: {0}")]
    Convert(String),
}

/// Outcome of normalizing one page
///
/// `Degraded` carries the raw markup unchanged so the page still reaches the
/// structuring service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Clean(String),
    Degraded { text: String, reason: String },
}

impl Normalized {
    pub fn text(&self) -> &str {
        match self {
            Self::Clean(text) => text,
            Self::Degraded { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Clean(text) => text,
            Self::Degraded { text, .. } => text,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Converts rendered page markup into plain text
#[derive(Debug, Clone)]
pub struct ContentNormalizer {
    main_selectors: Vec<Selector>,
}

impl ContentNormalizer {
    /// Compiles the main-content selectors
    pub fn try_new() -> Result<Self, NormalizeError> {
        let main_selectors = MAIN_CONTENT_SELECTORS
            .iter()
            .map(|css| Selector::parse(css).map_err(|_| NormalizeError::Selector(css.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { main_selectors })
    }

    /// Normalizes markup, falling back to the raw markup on failure
    pub fn normalize(&self, raw_markup: &str) -> Normalized {
        match self.try_normalize(raw_markup) {
            Ok(text) => Normalized::Clean(text),
            Err(e) => {
                tracing::warn!(error = %e, "normalization failed, keeping raw markup");
                Normalized::Degraded {
                    text: raw_markup.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Normalizes markup, reporting failures instead of degrading
    pub fn try_normalize(&self, raw_markup: &str) -> Result<String, NormalizeError> {
        if raw_markup.trim().is_empty() {
            return Ok(String::new());
        }

        let document = Html::parse_document(raw_markup);
        let region = self.main_region(&document);

        let converter = HtmlToMarkdown::builder()
            .skip_tags(NOISE_ELEMENTS.to_vec())
            .build();
        let markdown = converter
            .convert(&region.html())
            .map_err(|e| NormalizeError::Convert(e.to_string()))?;

        let text = markdown.trim();
        if text.is_empty() {
            return Err(NormalizeError::Empty(raw_markup.len()));
        }

        Ok(text.to_string())
    }

    /// Picks the main content element, or the whole document
    fn main_region<'a>(&self, document: &'a Html) -> ElementRef<'a> {
        self.main_selectors
            .iter()
            .find_map(|selector| document.select(selector).find(|el| !inside_noise(el)))
            .unwrap_or_else(|| document.root_element())
    }
}

/// Normalizes markup with the default main-content rules
pub fn normalize(raw_markup: &str) -> Normalized {
    match ContentNormalizer::try_new() {
        Ok(normalizer) => normalizer.normalize(raw_markup),
        Err(e) => Normalized::Degraded {
            text: raw_markup.to_string(),
            reason: e.to_string(),
        },
    }
}

fn inside_noise(element: &ElementRef<'_>) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .map_or(false, |el| NOISE_ELEMENTS.contains(&el.name()))
    })
}
