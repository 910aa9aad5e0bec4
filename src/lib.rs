//! Docharvest: a documentation-site harvester
//!
//! This crate crawls a documentation site, discovers its pages (sitemap first,
//! link-following as a fallback), and stores each page as a Markdown document.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod sitemap;
pub mod storage;
pub mod tokens;
pub mod url;

use thiserror::Error;

/// Structural errors that abort a whole crawl run
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid filter pattern '{pattern}': {source}")]
    InvalidFilter {
        pattern: String,
        source: regex::Error,
    },

    #[error("Invalid source URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: ::url::ParseError,
    },

    #[error("Sitemap discovery failed: {0}")]
    Sitemap(#[from] sitemap::SitemapError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Frontier error: {0}")]
    Frontier(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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

/// Result type alias for Docharvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    CrawlResult, CrawlSettings, Crawler, DiscoveredLink, Frontier, LinkPriority, ProgressEvent,
    ProgressKind,
};
pub use url::{strip_fragment, UrlFilter};
