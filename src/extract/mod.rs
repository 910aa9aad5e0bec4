//! Page-level HTML processing
//!
//! This module provides the synchronous collaborators the scheduler runs on
//! fetched HTML:
//! - Main-content and title extraction
//! - HTML to Markdown conversion
//! - Documentation framework detection
//! - Prioritized link extraction

mod content;
mod framework;
mod links;
mod markdown;

pub use content::MainContentExtractor;
pub use framework::{Framework, MarkerDetector};
pub use links::LinkRegistry;
pub use markdown::HtmdConverter;

use crate::crawler::DiscoveredLink;
use thiserror::Error;

/// Title and main-content HTML pulled from a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub title: String,
    pub content: String,
}

/// Errors from content or link extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Document is empty")]
    EmptyDocument,

    #[error("Invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
}

/// Errors from HTML to Markdown conversion
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Markdown conversion failed: {0}")]
    Conversion(String),
}

/// Pulls the title and main content out of a full HTML document
pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> Result<Extracted, ExtractError>;
}

/// Converts an HTML fragment to Markdown
pub trait Converter: Send + Sync {
    fn convert(&self, html: &str) -> Result<String, ConvertError>;
}

/// Identifies which documentation generator produced a page
pub trait FrameworkDetector: Send + Sync {
    fn detect(&self, html: &str) -> Framework;
}

/// Extracts prioritized outgoing links from a page
pub trait LinkSelector: Send + Sync {
    /// Returns absolute http(s) links found in `html`, resolved against `base_url`
    fn extract_links(&self, html: &str, base_url: &str) -> Result<Vec<DiscoveredLink>, ExtractError>;
}
