use crate::config::types::{
    Config, CrawlerConfig, FetcherConfig, LocaleConfig, OutputConfig, StructurerConfig,
    TargetConfig,
};
use crate::{ConfigError, ConfigResult};
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_target_config(&config.target)?;
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_locale_config(&config.locales)?;
    validate_structurer_config(&config.structurer)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the seed URL and allow list
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    let seed = validate_http_url(&config.seed_url, "seed-url")?;

    for entry in &config.allow_list {
        let url = validate_http_url(entry, "allow-list entry")?;
        if url.host_str() != seed.host_str() || url.port() != seed.port() {
            return Err(ConfigError::Validation(format!(
                "Allow-list entry '{}' is not on the seed domain '{}'",
                entry,
                seed.host_str().unwrap_or_default()
            )));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min-delay-ms ({}) must not exceed max-delay-ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Selector::parse(&config.locale_selector).map_err(|e| {
        ConfigError::Validation(format!(
            "locale-selector '{}' is not a valid CSS selector: {:?}",
            config.locale_selector, e
        ))
    })?;

    if config.locale_param.is_empty() {
        return Err(ConfigError::Validation(
            "locale-param cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the locale list
fn validate_locale_config(config: &LocaleConfig) -> Result<(), ConfigError> {
    if config.default_key.is_empty() {
        return Err(ConfigError::Validation(
            "locales.default-key cannot be empty".to_string(),
        ));
    }

    if config.supported.is_empty() {
        return Err(ConfigError::Validation(
            "locales.supported must list at least one locale".to_string(),
        ));
    }

    let mut keys = HashSet::new();
    for entry in &config.supported {
        if entry.code.is_empty() || entry.key.is_empty() {
            return Err(ConfigError::Validation(
                "locale entries need a non-empty code and key".to_string(),
            ));
        }
        if !keys.insert(entry.key.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate locale key '{}'",
                entry.key
            )));
        }
    }

    Ok(())
}

/// Validates structuring service configuration
fn validate_structurer_config(config: &StructurerConfig) -> Result<(), ConfigError> {
    if config.model.is_empty() {
        return Err(ConfigError::Validation(
            "structurer.model cannot be empty".to_string(),
        ));
    }

    validate_http_url(&config.endpoint, "structurer.endpoint")?;

    if config.api_key_env.is_empty() {
        return Err(ConfigError::Validation(
            "structurer.api-key-env cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "structurer.timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "output.path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(value: &str, field: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            field, value
        )));
    }

    Ok(url)
}
