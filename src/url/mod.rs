//! URL handling module for Docharvest
//!
//! This module provides fragment stripping, host extraction, crawl-scope
//! checks and the regex include-filter applied to discovered links.

mod domain;
mod filter;
mod normalize;
mod scope;

// Re-export main functions
pub use domain::{domain_of, extract_domain};
pub use filter::UrlFilter;
pub use normalize::strip_fragment;
pub use scope::Scope;
