//! Configuration module for Docharvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every field has a default, so a missing file yields a usable configuration.
//!
//! # Example
//!
//! ```no_run
//! use docharvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("docharvest.toml")).unwrap();
//! println!("Crawler will use {} workers", config.crawler.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BrowserConfig, Config, CrawlerConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{load_config, load_config_or_default, parse_config};
