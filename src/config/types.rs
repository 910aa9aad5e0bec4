use serde::Deserialize;

/// Main configuration structure for Docharvest
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Worker count for project crawls
    pub concurrency: usize,

    /// Worker count for discovery-only walks
    #[serde(rename = "discovery-concurrency")]
    pub discovery_concurrency: usize,

    /// Hard ceiling on URLs dispatched during one link-following walk
    #[serde(rename = "max-urls")]
    pub max_urls: usize,

    /// Steady-state request rate allowed per host
    #[serde(rename = "requests-per-second")]
    pub requests_per_second: f64,

    /// Backoff delays between fetch attempts (milliseconds)
    #[serde(rename = "retry-delays-ms")]
    pub retry_delays_ms: Vec<u64>,

    /// How long shutdown waits for in-flight results (milliseconds)
    #[serde(rename = "drain-timeout-ms")]
    pub drain_timeout_ms: u64,

    /// Expected number of distinct URLs, used to size the seen-set
    #[serde(rename = "frontier-capacity")]
    pub frontier_capacity: usize,

    /// Target false-positive rate of the seen-set
    #[serde(rename = "frontier-false-positive-rate")]
    pub frontier_false_positive_rate: f64,

    /// Per-request timeout for plain HTTP fetches (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            discovery_concurrency: 3,
            max_urls: 1000,
            requests_per_second: 2.0,
            retry_delays_ms: vec![1000, 2000, 4000],
            drain_timeout_ms: 5000,
            frontier_capacity: 100_000,
            frontier_false_positive_rate: 0.001,
            request_timeout_secs: 30,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub name: String,

    /// Version of the crawler
    pub version: String,

    /// URL with information about the crawler (optional)
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: "docharvest".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: String::new(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        if self.contact_url.is_empty() {
            format!("{}/{}", self.name, self.version)
        } else {
            format!("{}/{} (+{})", self.name, self.version, self.contact_url)
        }
    }
}

/// Headless browser configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Whether browser rendering may be chosen at all
    pub enabled: bool,

    /// Explicit Chrome/Chromium executable; auto-detected when absent
    #[serde(rename = "chrome-executable")]
    pub chrome_executable: Option<String>,

    /// Upper bound on a single page navigation (seconds)
    #[serde(rename = "navigation-timeout-secs")]
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chrome_executable: None,
            navigation_timeout_secs: 30,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "docharvest.db".to_string(),
        }
    }
}
