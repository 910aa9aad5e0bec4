//! Crawl orchestrator - the top-level entry point of a crawl run
//!
//! A crawl tries the sitemap first. A non-empty sitemap gives a fixed URL
//! list that is processed with bounded concurrency and saved in sitemap
//! order. Otherwise the walk coordinator follows links from the source URL
//! and documents are saved as results arrive.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::coordinator::{ResultHandler, WalkConfig, WalkCoordinator, WalkScope};
use crate::crawler::pipeline::{DiscoveryProcessor, PagePipeline, PageResult};
use crate::crawler::prober::FetchStrategyProber;
use crate::crawler::retry::DEFAULT_RETRY_DELAYS;
use crate::crawler::{
    build_http_client, BrowserFetcher, DomainLimiter, Fetcher, HttpFetcher, ProgressEvent,
};
use crate::extract::{
    Converter, Extractor, FrameworkDetector, HtmdConverter, LinkRegistry, LinkSelector,
    MainContentExtractor, MarkerDetector,
};
use crate::sitemap::{SitemapDiscoverer, SitemapError, SitemapSource};
use crate::storage::{DocumentStore, NewDocument, Project, Storage};
use crate::tokens::{ApproxTokenCounter, TokenCounter};
use crate::url::{Scope, UrlFilter};
use crate::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Callback receiving progress events; runs on the coordinator, keep it quick
pub type ProgressFn<'a> = &'a mut (dyn FnMut(ProgressEvent) + Send);

/// Aggregate outcome of a crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlResult {
    pub saved: usize,
    pub failed: usize,
    /// Markdown bytes of saved documents
    pub bytes: usize,
    /// Estimated tokens of saved documents
    pub tokens: usize,
}

/// Per-run tunables
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub concurrency: usize,
    pub discovery_concurrency: usize,
    pub max_urls: usize,
    pub retry_delays: Vec<Duration>,
    pub drain_timeout: Duration,
    pub frontier_capacity: usize,
    pub false_positive_rate: f64,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        let walk = WalkConfig::default();
        Self {
            concurrency: 10,
            discovery_concurrency: 3,
            max_urls: walk.max_urls,
            retry_delays: DEFAULT_RETRY_DELAYS.to_vec(),
            drain_timeout: walk.drain_timeout,
            frontier_capacity: walk.frontier_capacity,
            false_positive_rate: walk.false_positive_rate,
        }
    }
}

impl CrawlSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            discovery_concurrency: config.discovery_concurrency,
            max_urls: config.max_urls,
            retry_delays: config
                .retry_delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            drain_timeout: Duration::from_millis(config.drain_timeout_ms),
            frontier_capacity: config.frontier_capacity,
            false_positive_rate: config.frontier_false_positive_rate,
        }
    }

    fn walk_config(&self, concurrency: usize) -> WalkConfig {
        WalkConfig {
            concurrency,
            max_urls: self.max_urls,
            drain_timeout: self.drain_timeout,
            frontier_capacity: self.frontier_capacity,
            false_positive_rate: self.false_positive_rate,
        }
    }
}

/// Everything a [`Crawler`] talks to
pub struct Collaborators {
    pub sitemap: Arc<dyn SitemapSource>,
    pub http: Arc<dyn Fetcher>,
    pub browser: Option<Arc<dyn Fetcher>>,
    pub detector: Arc<dyn FrameworkDetector>,
    pub extractor: Arc<dyn Extractor>,
    pub converter: Arc<dyn Converter>,
    pub links: Arc<dyn LinkSelector>,
    pub store: Arc<dyn DocumentStore>,
    pub tokens: Arc<dyn TokenCounter>,
}

pub struct Crawler {
    settings: CrawlSettings,
    sitemap: Arc<dyn SitemapSource>,
    prober: FetchStrategyProber,
    pipeline: Arc<PagePipeline>,
    store: Arc<dyn DocumentStore>,
    tokens: Arc<dyn TokenCounter>,
}

impl Crawler {
    pub fn new(settings: CrawlSettings, collaborators: Collaborators) -> Self {
        let Collaborators {
            sitemap,
            http,
            browser,
            detector,
            extractor,
            converter,
            links,
            store,
            tokens,
        } = collaborators;

        let pipeline = PagePipeline::new(Arc::clone(&extractor), converter, links)
            .with_retry_delays(settings.retry_delays.clone());

        Self {
            prober: FetchStrategyProber::new(http, browser, detector, extractor),
            pipeline: Arc::new(pipeline),
            settings,
            sitemap,
            store,
            tokens,
        }
    }

    /// Wires the production collaborators from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `store` - Destination for saved documents
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to crawl
    /// * `Err(HarvestError)` - The HTTP client could not be built
    pub fn from_config(config: &Config, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?;
        let limiter = Arc::new(DomainLimiter::new(config.crawler.requests_per_second));

        let browser: Option<Arc<dyn Fetcher>> = if config.browser.enabled {
            Some(Arc::new(BrowserFetcher::new(
                config.browser.clone(),
                Arc::clone(&limiter),
            )))
        } else {
            None
        };

        let detector: Arc<dyn FrameworkDetector> = Arc::new(MarkerDetector::new());

        let collaborators = Collaborators {
            sitemap: Arc::new(SitemapDiscoverer::new(client.clone())),
            http: Arc::new(HttpFetcher::new(client, limiter)),
            browser,
            links: Arc::new(LinkRegistry::new(Arc::clone(&detector))),
            detector,
            extractor: Arc::new(MainContentExtractor::new()),
            converter: Arc::new(HtmdConverter::new()),
            store,
            tokens: Arc::new(ApproxTokenCounter),
        };

        Ok(Self::new(
            CrawlSettings::from_config(&config.crawler),
            collaborators,
        ))
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Crawls a project and stores each page as a document
    ///
    /// Individual page failures are counted and reported through `progress`,
    /// never returned. Cancellation ends the run early with the partial
    /// result. Exactly one `Finished` event is emitted on every `Ok` path.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlResult)` - Counts for the run, possibly partial
    /// * `Err(HarvestError)` - Invalid filter pattern, malformed source URL or sitemap failure
    pub async fn crawl_project(
        &self,
        cancel: &CancellationToken,
        project: &Project,
        progress: ProgressFn<'_>,
    ) -> Result<CrawlResult> {
        let filter = UrlFilter::from_patterns(&project.filter_patterns)?;
        Scope::from_source(&project.source_url)?;

        tracing::info!(project = %project.name, url = %project.source_url, "crawl started");

        let urls = match self
            .sitemap
            .discover_urls(cancel, &project.source_url, Some(&filter))
            .await
        {
            Ok(urls) => urls,
            Err(SitemapError::Cancelled) => {
                progress(ProgressEvent::finished(0, 0));
                return Ok(CrawlResult::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut run = RunState::default();

        if cancel.is_cancelled() {
            progress(ProgressEvent::finished(0, 0));
            return Ok(run.result);
        }

        let total = urls.len();
        if total > 0 {
            tracing::info!(count = total, "using sitemap URLs");
            let fetcher = self.prober.select(cancel, &urls[0]).await;
            self.crawl_sitemap(cancel, project, urls, fetcher, &mut run, progress)
                .await;
        } else {
            tracing::info!("no sitemap URLs, following links");
            let fetcher = self.prober.select(cancel, &project.source_url).await;
            let mut accumulator = WalkAccumulator {
                project_id: project.id,
                store: self.store.as_ref(),
                tokens: self.tokens.as_ref(),
                progress: &mut *progress,
                run: &mut run,
            };
            WalkCoordinator::new(self.settings.walk_config(self.settings.concurrency))
                .walk(
                    cancel,
                    &project.source_url,
                    Some(&filter),
                    fetcher,
                    Arc::clone(&self.pipeline) as _,
                    &mut accumulator,
                )
                .await?;
        }

        progress(ProgressEvent::finished(run.completed, total));

        tracing::info!(
            project = %project.name,
            saved = run.result.saved,
            failed = run.result.failed,
            bytes = run.result.bytes,
            tokens = run.result.tokens,
            cancelled = cancel.is_cancelled(),
            "crawl finished"
        );

        Ok(run.result)
    }

    /// Crawls a project again, replacing its previously stored documents
    ///
    /// The earlier documents are retired only after a complete run that saved
    /// at least one page. A structural error, a cancelled run or a run where
    /// every page failed leaves them in place next to whatever was saved.
    ///
    /// # Returns
    ///
    /// * `Ok((CrawlResult, usize))` - Counts for the run and the number of retired documents
    /// * `Err(HarvestError)` - As for [`Crawler::crawl_project`], or a storage failure
    pub async fn recrawl_project(
        &self,
        cancel: &CancellationToken,
        project: &Project,
        storage: &dyn Storage,
        progress: ProgressFn<'_>,
    ) -> Result<(CrawlResult, usize)> {
        let previous = storage.latest_document_id(project.id)?;

        let result = self.crawl_project(cancel, project, progress).await?;

        let Some(max_id) = previous else {
            return Ok((result, 0));
        };
        if cancel.is_cancelled() || result.saved == 0 {
            tracing::info!(
                project = %project.name,
                "keeping previously stored documents"
            );
            return Ok((result, 0));
        }

        let retired = storage.delete_documents_through(project.id, max_id)?;
        tracing::info!(project = %project.name, retired, "retired previous documents");
        Ok((result, retired))
    }

    async fn crawl_sitemap(
        &self,
        cancel: &CancellationToken,
        project: &Project,
        urls: Vec<String>,
        fetcher: Arc<dyn Fetcher>,
        run: &mut RunState,
        progress: ProgressFn<'_>,
    ) {
        let total = urls.len();
        progress(ProgressEvent::started(total));

        let pipeline = self.pipeline.as_ref();
        let fetcher = fetcher.as_ref();

        let mut pages = stream::iter(urls.into_iter().enumerate())
            .take_while(|_| futures::future::ready(!cancel.is_cancelled()))
            .map(|(position, url)| pipeline.process_page(cancel, position, url, fetcher, false))
            .buffer_unordered(self.settings.concurrency.max(1));

        let mut successes = Vec::new();
        while let Some(page) = pages.next().await {
            if let Some(e) = &page.err {
                if !e.is_cancelled() {
                    run.fail(total, &page.url, e, progress);
                }
                continue;
            }
            successes.push(page);
        }

        // Save in sitemap order
        successes.sort_by_key(|page| page.position);
        for page in successes {
            run.save(
                self.store.as_ref(),
                self.tokens.as_ref(),
                project.id,
                page,
                total,
                progress,
            )
            .await;
        }
    }

    /// Lists the pages reachable from `source` without storing anything
    ///
    /// Returns successfully fetched URLs in completion order; cancellation
    /// returns the partial list.
    pub async fn discover_urls(
        &self,
        cancel: &CancellationToken,
        source: &str,
        filter: &UrlFilter,
    ) -> Result<Vec<String>> {
        Scope::from_source(source)?;

        let fetcher = self.prober.select(cancel, source).await;
        let processor = Arc::new(DiscoveryProcessor::new(Arc::clone(&self.pipeline)));
        let mut collector = DiscoveryCollector::default();

        WalkCoordinator::new(self.settings.walk_config(self.settings.discovery_concurrency))
            .walk(cancel, source, Some(filter), fetcher, processor, &mut collector)
            .await?;

        Ok(collector.urls)
    }
}

/// Counters owned by a single crawl run
#[derive(Debug, Default)]
struct RunState {
    result: CrawlResult,
    completed: usize,
    position: usize,
}

impl RunState {
    fn fail(
        &mut self,
        total: usize,
        url: &str,
        error: &dyn std::fmt::Display,
        progress: &mut (dyn FnMut(ProgressEvent) + Send),
    ) {
        tracing::warn!(url, "page failed: {error}");
        self.result.failed += 1;
        self.completed += 1;
        progress(ProgressEvent::failed(self.completed, total, url, error));
    }

    async fn save(
        &mut self,
        store: &dyn DocumentStore,
        tokens: &dyn TokenCounter,
        project_id: i64,
        page: PageResult,
        total: usize,
        progress: &mut (dyn FnMut(ProgressEvent) + Send),
    ) {
        let document = NewDocument {
            project_id,
            source_url: page.url,
            title: page.title,
            content: page.markdown,
            content_hash: page.hash,
            position: page.position as i64,
        };

        match store.create_document(&document).await {
            Ok(_) => {
                self.result.saved += 1;
                self.result.bytes += document.content.len();
                self.result.tokens += tokens.count(&document.content);
                self.completed += 1;
                progress(ProgressEvent::completed(
                    self.completed,
                    total,
                    document.source_url,
                ));
            }
            Err(e) => self.fail(total, &document.source_url, &e, progress),
        }
    }
}

/// Result handler of the link-following path
struct WalkAccumulator<'a> {
    project_id: i64,
    store: &'a dyn DocumentStore,
    tokens: &'a dyn TokenCounter,
    progress: ProgressFn<'a>,
    run: &'a mut RunState,
}

#[async_trait]
impl ResultHandler for WalkAccumulator<'_> {
    async fn handle(&mut self, walk: &WalkScope<'_>, mut page: PageResult) {
        walk.enqueue_discovered(&page.discovered);

        if let Some(e) = &page.err {
            if !e.is_cancelled() {
                self.run.fail(0, &page.url, e, &mut *self.progress);
            }
            return;
        }

        // Positions follow completion order
        page.position = self.run.position;
        self.run.position += 1;
        self.run
            .save(
                self.store,
                self.tokens,
                self.project_id,
                page,
                0,
                &mut *self.progress,
            )
            .await;
    }
}

/// Result handler of discovery-only walks
#[derive(Default)]
struct DiscoveryCollector {
    urls: Vec<String>,
}

#[async_trait]
impl ResultHandler for DiscoveryCollector {
    async fn handle(&mut self, walk: &WalkScope<'_>, page: PageResult) {
        walk.enqueue_discovered(&page.discovered);
        match page.err {
            None => self.urls.push(page.url),
            Some(e) if e.is_cancelled() => {}
            Some(e) => tracing::warn!(url = %page.url, "page failed: {e}"),
        }
    }
}
