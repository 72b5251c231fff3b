use serde::Deserialize;

/// Main configuration structure for Mastodonte
///
/// Every section has defaults, so an empty file (or no file at all) yields a
/// usable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    pub api: ApiConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Items requested per timeline page
    #[serde(rename = "page-limit")]
    pub page_limit: u32,

    /// Items requested per follower/following/reblogger page
    #[serde(rename = "follow-page-limit")]
    pub follow_page_limit: u32,

    /// Maximum pages fetched per target in one invocation
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Number of concurrent workers for multi-target runs
    pub workers: usize,

    /// Unconditional pause before every request (milliseconds)
    #[serde(rename = "politeness-delay-ms")]
    pub politeness_delay_ms: u64,

    /// Remaining-quota threshold at or below which workers wait for the reset
    #[serde(rename = "rate-limit-tolerance")]
    pub rate_limit_tolerance: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_limit: 40,
            follow_page_limit: 80,
            max_pages: 100,
            workers: 8,
            politeness_delay_ms: 1000,
            rate_limit_tolerance: 5,
            request_timeout_secs: 30,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "Mastodonte".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.org/mastodonte".to_string(),
            contact_email: "crawler@example.org".to_string(),
        }
    }
}

/// Which persistence backend holds the checkpoint index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    Json,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding the checkpoint index
    #[serde(rename = "state-dir")]
    pub state_dir: String,

    /// Directory under which per-target item files are written
    #[serde(rename = "data-dir")]
    pub data_dir: String,

    #[serde(rename = "checkpoint-backend")]
    pub checkpoint_backend: CheckpointBackend,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            state_dir: "__mastodonte__".to_string(),
            data_dir: ".".to_string(),
            checkpoint_backend: CheckpointBackend::Json,
        }
    }
}

/// Mapping from the remote API's wire names to the values the engine needs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// URL scheme used to reach instances
    pub scheme: String,

    /// Header carrying the remaining request quota
    #[serde(rename = "remaining-header")]
    pub remaining_header: String,

    /// Header carrying the quota reset timestamp
    #[serde(rename = "reset-header")]
    pub reset_header: String,

    /// Query parameter of the `rel="next"` link that holds the cursor
    #[serde(rename = "cursor-param")]
    pub cursor_param: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            remaining_header: "X-RateLimit-Remaining".to_string(),
            reset_header: "X-RateLimit-Reset".to_string(),
            cursor_param: "max_id".to_string(),
        }
    }
}
