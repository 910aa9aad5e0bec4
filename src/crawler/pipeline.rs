//! Per-page processing: fetch, extract, convert, hash, discover links

use crate::crawler::coordinator::PageProcessor;
use crate::crawler::retry::{fetch_with_retry, DEFAULT_RETRY_DELAYS};
use crate::crawler::{DiscoveredLink, FetchError, Fetcher};
use crate::extract::{ConvertError, Converter, ExtractError, Extractor, LinkSelector};
use crate::storage::StorageError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use xxhash_rust::xxh3::xxh3_64;

/// Why a single page could not be turned into a document
#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("Failed to store document: {0}")]
    Store(#[from] StorageError),
}

impl PageError {
    /// Whether the page was abandoned because the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PageError::Fetch(e) if e.is_cancelled())
    }
}

/// Outcome of processing one URL
///
/// `discovered` is filled whenever the fetch succeeded, even if a later
/// pipeline step failed, so a broken page still feeds the walk.
#[derive(Debug, Default)]
pub struct PageResult {
    pub position: usize,
    pub url: String,
    pub title: String,
    pub markdown: String,
    pub hash: String,
    pub err: Option<PageError>,
    pub discovered: Vec<DiscoveredLink>,
}

impl PageResult {
    fn failed(position: usize, url: String, err: PageError) -> Self {
        Self {
            position,
            url,
            err: Some(err),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.err.is_none()
    }
}

/// Hex-encoded xxh3-64 of the Markdown, used for change detection
pub fn content_hash(markdown: &str) -> String {
    hex::encode(xxh3_64(markdown.as_bytes()).to_be_bytes())
}

/// Fetch → extract → convert → hash, with optional link discovery
pub struct PagePipeline {
    extractor: Arc<dyn Extractor>,
    converter: Arc<dyn Converter>,
    links: Arc<dyn LinkSelector>,
    retry_delays: Vec<Duration>,
}

impl PagePipeline {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        converter: Arc<dyn Converter>,
        links: Arc<dyn LinkSelector>,
    ) -> Self {
        Self {
            extractor,
            converter,
            links,
            retry_delays: DEFAULT_RETRY_DELAYS.to_vec(),
        }
    }

    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    pub fn extractor(&self) -> &dyn Extractor {
        self.extractor.as_ref()
    }

    /// Fetches a page, retrying transient failures with backoff
    pub async fn fetch(
        &self,
        cancel: &CancellationToken,
        fetcher: &dyn Fetcher,
        url: &str,
    ) -> Result<String, FetchError> {
        // Pages queued before cancellation must not start
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let log = |retry: usize, error: &FetchError| {
            tracing::warn!(url, retry, error = %error, "fetch failed, retrying");
        };

        fetch_with_retry(
            cancel,
            url,
            || fetcher.fetch(cancel, url),
            Some(&log),
            &self.retry_delays,
        )
        .await
    }

    /// Links found on a fetched page; extraction failures yield none
    pub fn discover(&self, url: &str, html: &str) -> Vec<DiscoveredLink> {
        match self.links.extract_links(html, url) {
            Ok(links) => links,
            Err(e) => {
                tracing::debug!(url, "link extraction failed: {e}");
                Vec::new()
            }
        }
    }

    /// Runs the whole pipeline for one URL
    ///
    /// # Arguments
    ///
    /// * `cancel` - Run cancellation token
    /// * `position` - Discovery position recorded on the result
    /// * `url` - Page to process
    /// * `fetcher` - Strategy selected for this run
    /// * `with_links` - Whether to extract outgoing links
    pub async fn process_page(
        &self,
        cancel: &CancellationToken,
        position: usize,
        url: String,
        fetcher: &dyn Fetcher,
        with_links: bool,
    ) -> PageResult {
        let html = match self.fetch(cancel, fetcher, &url).await {
            Ok(html) => html,
            Err(e) => return PageResult::failed(position, url, e.into()),
        };

        let discovered = if with_links {
            self.discover(&url, &html)
        } else {
            Vec::new()
        };

        let rendered = self
            .extractor
            .extract(&html)
            .map_err(PageError::from)
            .and_then(|extracted| {
                let markdown = self.converter.convert(&extracted.content)?;
                Ok((extracted.title, markdown))
            });

        match rendered {
            Ok((title, markdown)) => PageResult {
                position,
                hash: content_hash(&markdown),
                url,
                title,
                markdown,
                err: None,
                discovered,
            },
            Err(e) => PageResult {
                discovered,
                ..PageResult::failed(position, url, e)
            },
        }
    }
}

#[async_trait]
impl PageProcessor for PagePipeline {
    async fn process(
        &self,
        cancel: &CancellationToken,
        link: DiscoveredLink,
        fetcher: Arc<dyn Fetcher>,
    ) -> PageResult {
        self.process_page(cancel, 0, link.url, fetcher.as_ref(), true)
            .await
    }
}

/// Fetch-and-discover only, for URL discovery walks
pub struct DiscoveryProcessor {
    pipeline: Arc<PagePipeline>,
}

impl DiscoveryProcessor {
    pub fn new(pipeline: Arc<PagePipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl PageProcessor for DiscoveryProcessor {
    async fn process(
        &self,
        cancel: &CancellationToken,
        link: DiscoveredLink,
        fetcher: Arc<dyn Fetcher>,
    ) -> PageResult {
        match self.pipeline.fetch(cancel, fetcher.as_ref(), &link.url).await {
            Ok(html) => PageResult {
                discovered: self.pipeline.discover(&link.url, &html),
                url: link.url,
                ..Default::default()
            },
            Err(e) => PageResult::failed(0, link.url, e.into()),
        }
    }
}
