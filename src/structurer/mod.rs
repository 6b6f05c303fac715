//! Structuring service adapter
//!
//! A structuring service turns the normalized text of a page into a JSON
//! document. The crawler only depends on the `Structurer` trait; `GeminiStructurer`
//! is the production implementation.

mod gemini;

pub use gemini::GeminiStructurer;

use crate::content::LocaleContent;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Instruction sent ahead of every page
pub const DEFAULT_SYSTEM_PROMPT: &str = "You extract structured data from web pages. \
Convert the page content you are given into a single JSON object with these fields: \
\"title\" (the page title), \"content\" (the main text, kept in the language and script it is written in), \
\"links\" (important links or references as objects with \"text\" and \"url\"), \
\"forms\" (application or form details, if any) and \"contact\" (contact information, if any). \
Keep every language present on the page. Respond with the JSON object only.";

/// Errors returned by a structuring service
#[derive(Debug, Error)]
pub enum StructureError {
    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("API key contains characters that cannot be sent in a header")]
    InvalidApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Service response contained no text")]
    EmptyResponse,

    #[error("Structuring timed out after {0:?}")]
    Timeout(Duration),
}

/// Converts normalized page text into structured output
#[async_trait]
pub trait Structurer: Send + Sync {
    /// Returns the service's textual answer for one page
    ///
    /// The answer is expected to be JSON but is not validated here; see
    /// [`parse_structured`].
    async fn structure(&self, text: &str, source_url: &str) -> Result<String, StructureError>;
}

/// Builds the user prompt for one page
pub fn build_prompt(text: &str, source_url: &str) -> String {
    format!("URL: {}\n\nPage content:\n{}", source_url, text)
}

/// Interprets a service answer
///
/// JSON objects and arrays (optionally wrapped in a Markdown code fence) become
/// `Structured`; anything else is kept verbatim as `Raw`.
pub fn parse_structured(output: &str) -> LocaleContent {
    let candidate = strip_code_fence(output);

    match serde_json::from_str::<serde_json::Value>(candidate) {
        Ok(value) if value.is_object() || value.is_array() => LocaleContent::Structured(value),
        _ => LocaleContent::Raw(output.to_string()),
    }
}

fn strip_code_fence(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json") on the opening fence line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}
