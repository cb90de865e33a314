use serde::Deserialize;
use std::time::Duration;

/// Default exclusion patterns, matched case-insensitively against a URL's path and query
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    r"/login",
    r"/logout",
    r"/admin",
    r"/wp-admin",
    r"/wp-login",
    r"\.pdf$",
    r"\.jpe?g$",
    r"\.png$",
    r"\.gif$",
    r"\.zip$",
    r"\.docx?$",
    r"/feed(/|$)",
    r"/rss(/|$)",
    r"/trackback(/|$)",
    r"[?&]replytocom=",
    r"/page/\d+(/|$)",
];

/// Main configuration structure for Site-Indexer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Builds a configuration with defaults everywhere except the seed list
    pub fn with_seeds(seeds: Vec<String>) -> Self {
        Self {
            crawler: CrawlerConfig {
                seeds,
                ..CrawlerConfig::default()
            },
            politeness: PolitenessConfig::default(),
            retry: RetryConfig::default(),
            user_agent: UserAgentConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            pipeline: PipelineConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Hosts considered in scope: the configured list, or the seed hosts when none is given
    pub fn effective_allowed_hosts(&self) -> Vec<String> {
        if !self.crawler.allowed_hosts.is_empty() {
            return self.crawler.allowed_hosts.clone();
        }

        let mut hosts: Vec<String> = self
            .crawler
            .seeds
            .iter()
            .filter_map(|seed| url::Url::parse(seed).ok())
            .filter_map(|url| url.host_str().map(|h| h.to_lowercase()))
            .collect();
        hosts.dedup();
        hosts
    }
}

/// Crawl scope and concurrency configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Seed URLs, crawled at depth 0
    pub seeds: Vec<String>,

    /// Hosts in scope; `www.` prefixes are ignored when comparing
    pub allowed_hosts: Vec<String>,

    /// Regular expressions; a URL whose path or query matches any of them is never fetched
    pub exclude_patterns: Vec<String>,

    /// Maximum link depth from the seeds
    pub max_depth: u32,

    /// Page budget for the run (0 = unlimited)
    pub max_pages: u64,

    /// Time budget for the run in seconds (0 = unlimited)
    pub max_duration_secs: u64,

    /// Maximum number of concurrent fetches overall
    pub concurrency: usize,

    /// Maximum number of concurrent fetches against one host
    pub per_host_concurrency: usize,

    /// Timeout for a single HTTP request
    pub request_timeout_secs: u64,

    /// Longest URL that is ever queued, in bytes (0 = unlimited)
    pub max_url_length: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            allowed_hosts: Vec::new(),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            max_depth: 3,
            max_pages: 0,
            max_duration_secs: 0,
            concurrency: 8,
            per_host_concurrency: 4,
            request_timeout_secs: 30,
            max_url_length: 2048,
        }
    }
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The time budget, if one is set
    pub fn max_duration(&self) -> Option<Duration> {
        (self.max_duration_secs > 0).then(|| Duration::from_secs(self.max_duration_secs))
    }
}

/// Per-host delay configuration, including the adaptive throttle bounds
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PolitenessConfig {
    /// Baseline delay between requests to the same host (milliseconds)
    pub base_delay_ms: u64,

    /// Upper bound of the random jitter added to every delay (milliseconds)
    pub jitter_ms: u64,

    /// Lower bound for the adaptive delay (milliseconds)
    pub min_delay_ms: u64,

    /// Upper bound for the adaptive delay (milliseconds)
    pub max_delay_ms: u64,

    /// Responses slower than this count as unhealthy (milliseconds)
    pub slow_response_ms: u64,

    /// Multiplier applied to a host's delay after an unhealthy response
    pub backoff_factor: f64,

    /// Amount the delay shrinks by after sustained healthy responses (milliseconds)
    pub recovery_step_ms: u64,

    /// Consecutive healthy responses required before each recovery step
    pub recovery_after: u32,

    /// Whether robots.txt is fetched and obeyed
    pub respect_robots: bool,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            jitter_ms: 500,
            min_delay_ms: 250,
            max_delay_ms: 10_000,
            slow_response_ms: 5_000,
            backoff_factor: 2.0,
            recovery_step_ms: 250,
            recovery_after: 3,
            respect_robots: true,
        }
    }
}

/// Retry policy for transient fetch failures
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RetryConfig {
    /// Number of retries after the first attempt
    pub max_retries: u32,

    /// HTTP statuses treated as transient
    pub retry_statuses: Vec<u16>,

    /// Backoff before the first retry (milliseconds); doubles on each further retry
    pub initial_backoff_ms: u64,

    /// Cap for the exponential backoff (milliseconds)
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_statuses: vec![500, 502, 503, 504, 408, 429],
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryConfig {
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Backoff to wait before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the token matched against robots.txt groups
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,

    /// Accept-Language header sent with every request
    pub accept_language: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SiteIndexer".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/bot".to_string(),
            contact_email: "bot@example.com".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the full User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Embedding service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible API; `/embeddings` is appended
    pub endpoint: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Bearer token, if the service requires one
    pub api_key: Option<String>,

    /// Vector dimensionality; discovered from the service at open when absent
    pub dimensions: Option<usize>,

    pub timeout_secs: u64,

    /// Inputs longer than this are truncated before they are sent
    pub max_input_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/v1".to_string(),
            model: "paraphrase-multilingual-MiniLM-L12-v2".to_string(),
            api_key: None,
            dimensions: None,
            timeout_secs: 30,
            max_input_chars: 8_000,
        }
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct VectorStoreConfig {
    /// Qdrant REST base URL
    pub url: String,

    /// Collection holding the page vectors
    pub collection: String,

    pub api_key: Option<String>,

    /// Drop and recreate the collection at open instead of reusing it
    pub recreate: bool,

    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "site_kb".to_string(),
            api_key: None,
            recreate: false,
            timeout_secs: 30,
        }
    }
}

/// Ingestion worker pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PipelineConfig {
    /// Number of workers consuming extracted documents
    pub workers: usize,

    /// Capacity of the bounded document queue between fetchers and the pipeline
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 32,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Directory receiving one JSON snapshot of all documents per run
    pub snapshot_dir: Option<String>,
}
