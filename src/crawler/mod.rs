//! Crawler module for page discovery and processing
//!
//! This module contains the crawl scheduler, including:
//! - The deduplicating priority frontier
//! - Per-host rate limiting and fetch retry
//! - HTTP and browser fetchers with one-shot strategy probing
//! - The walk coordinator and its worker pool
//! - Overall crawl orchestration and progress reporting

mod browser;
mod coordinator;
mod fetcher;
mod frontier;
mod limiter;
mod orchestrator;
mod pipeline;
mod prober;
mod progress;
mod retry;

pub use browser::BrowserFetcher;
pub use coordinator::{
    PageProcessor, ResultHandler, WalkConfig, WalkCoordinator, WalkScope, WalkSummary,
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_MAX_URLS,
};
pub use fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher};
pub use frontier::{
    DiscoveredLink, Frontier, LinkPriority, DEFAULT_FALSE_POSITIVE_RATE, DEFAULT_FRONTIER_CAPACITY,
};
pub use limiter::DomainLimiter;
pub use orchestrator::{Collaborators, CrawlResult, CrawlSettings, Crawler, ProgressFn};
pub use pipeline::{content_hash, DiscoveryProcessor, PageError, PagePipeline, PageResult};
pub use prober::{content_differs, FetchStrategy, FetchStrategyProber};
pub use progress::{ProgressEvent, ProgressKind};
pub use retry::{fetch_with_retry, RetryLog, DEFAULT_RETRY_DELAYS};
