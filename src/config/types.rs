use serde::Deserialize;

/// Main configuration structure for Sitelingo
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub locales: LocaleConfig,
    #[serde(default)]
    pub structurer: StructurerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Seed URL; its host defines the crawl domain
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// URL prefixes the crawl may enter. Empty means the whole domain.
    #[serde(rename = "allow-list", default)]
    pub allow_list: Vec<String>,
}

/// Crawl loop behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of pages dispatched to the extraction pipeline
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: usize,

    /// Lower bound of the randomized delay between pages (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the randomized delay between pages (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Deadline for extracting a single page (seconds, 0 disables)
    #[serde(rename = "page-timeout-secs", default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// Write the output file every N dispatched pages (0 disables)
    #[serde(rename = "checkpoint-every", default)]
    pub checkpoint_every: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            page_timeout_secs: default_page_timeout_secs(),
            checkpoint_every: 0,
        }
    }
}

/// Page fetcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Accept-Language sent with the initial page load
    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,

    /// Request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// CSS selector identifying the locale-switch control
    #[serde(rename = "locale-selector", default = "default_locale_selector")]
    pub locale_selector: String,

    /// Query parameter carrying the locale code when switching
    #[serde(rename = "locale-param", default = "default_locale_param")]
    pub locale_param: String,

    /// Fixed wait after a navigation or locale switch (milliseconds)
    #[serde(rename = "settle-dwell-ms", default = "default_settle_dwell_ms")]
    pub settle_dwell_ms: u64,

    /// Interval between readiness polls (milliseconds)
    #[serde(rename = "settle-poll-ms", default = "default_settle_poll_ms")]
    pub settle_poll_ms: u64,

    /// Maximum readiness polls after the dwell (0 keeps the plain dwell)
    #[serde(rename = "settle-max-polls", default)]
    pub settle_max_polls: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            request_timeout_secs: default_request_timeout_secs(),
            locale_selector: default_locale_selector(),
            locale_param: default_locale_param(),
            settle_dwell_ms: default_settle_dwell_ms(),
            settle_poll_ms: default_settle_poll_ms(),
            settle_max_polls: 0,
        }
    }
}

/// Locales captured on pages that expose a locale switch
#[derive(Debug, Clone, Deserialize)]
pub struct LocaleConfig {
    /// Record key used for pages without a locale switch
    #[serde(rename = "default-key", default = "default_locale_key")]
    pub default_key: String,

    #[serde(default = "default_supported_locales")]
    pub supported: Vec<LocaleEntry>,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default_key: default_locale_key(),
            supported: default_supported_locales(),
        }
    }
}

/// A single locale option
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LocaleEntry {
    /// Value selected in the locale-switch control (e.g. "en")
    pub code: String,

    /// Key under which the content is stored in the record (e.g. "english")
    pub key: String,
}

/// Structuring service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StructurerConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout for one structuring call (seconds)
    #[serde(rename = "timeout-secs", default = "default_structurer_timeout_secs")]
    pub timeout_secs: u64,

    /// Replaces the built-in system instruction
    #[serde(rename = "system-prompt", default)]
    pub system_prompt: Option<String>,
}

impl Default for StructurerConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_structurer_timeout_secs(),
            system_prompt: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the JSON results file
    #[serde(default = "default_output_path")]
    pub path: String,

    /// Optional log file receiving the same events as stderr
    #[serde(rename = "log-file", default)]
    pub log_file: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            log_file: None,
        }
    }
}

impl Config {
    /// Builds a configuration with defaults for everything but the target
    pub fn for_target(seed_url: impl Into<String>, allow_list: Vec<String>) -> Self {
        Self {
            target: TargetConfig {
                seed_url: seed_url.into(),
                allow_list,
            },
            crawler: CrawlerConfig::default(),
            fetcher: FetcherConfig::default(),
            locales: LocaleConfig::default(),
            structurer: StructurerConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

fn default_max_pages() -> usize {
    10
}

fn default_min_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    4000
}

fn default_page_timeout_secs() -> u64 {
    300
}

fn default_user_agent() -> String {
    format!("sitelingo/{}", env!("CARGO_PKG_VERSION"))
}

fn default_accept_language() -> String {
    "or,en".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_locale_selector() -> String {
    "#lang_select".to_string()
}

fn default_locale_param() -> String {
    "lang".to_string()
}

fn default_settle_dwell_ms() -> u64 {
    3000
}

fn default_settle_poll_ms() -> u64 {
    500
}

fn default_locale_key() -> String {
    "english".to_string()
}

fn default_supported_locales() -> Vec<LocaleEntry> {
    vec![
        LocaleEntry {
            code: "en".to_string(),
            key: "english".to_string(),
        },
        LocaleEntry {
            code: "od".to_string(),
            key: "odia".to_string(),
        },
    ]
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_structurer_timeout_secs() -> u64 {
    60
}

fn default_output_path() -> String {
    "crawl_results.json".to_string()
}
