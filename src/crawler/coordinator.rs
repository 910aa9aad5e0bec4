//! Walk coordinator - link-following discovery over a bounded worker pool
//!
//! A single coordinator loop owns all walk bookkeeping:
//! - Dispatching frontier links to `concurrency` workers
//! - Handing each completed result to the caller's [`ResultHandler`]
//! - Enforcing the global dispatch cap
//! - Draining in-flight results on shutdown
//!
//! Workers are reduced to `link -> PageResult` functions; only the
//! coordinator ever touches the handler, so handlers need no locking.

use crate::crawler::frontier::{DEFAULT_FALSE_POSITIVE_RATE, DEFAULT_FRONTIER_CAPACITY};
use crate::crawler::{DiscoveredLink, Fetcher, Frontier, LinkPriority, PageResult};
use crate::url::{Scope, UrlFilter};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Default ceiling on dispatched URLs per walk
pub const DEFAULT_MAX_URLS: usize = 1000;

/// Default grace period for in-flight results after the loop ends
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for one walk
#[derive(Debug, Clone)]
pub struct WalkConfig {
    pub concurrency: usize,
    pub max_urls: usize,
    pub drain_timeout: Duration,
    pub frontier_capacity: usize,
    pub false_positive_rate: f64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            max_urls: DEFAULT_MAX_URLS,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            frontier_capacity: DEFAULT_FRONTIER_CAPACITY,
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
        }
    }
}

/// Turns one link into a result; runs on worker tasks
#[async_trait]
pub trait PageProcessor: Send + Sync {
    async fn process(
        &self,
        cancel: &CancellationToken,
        link: DiscoveredLink,
        fetcher: Arc<dyn Fetcher>,
    ) -> PageResult;
}

/// Consumes results; always invoked from the coordinator, one at a time
#[async_trait]
pub trait ResultHandler: Send {
    async fn handle(&mut self, walk: &WalkScope<'_>, result: PageResult);
}

/// The handler's view of the walk: scope rules plus the frontier to feed
pub struct WalkScope<'a> {
    frontier: &'a Frontier,
    scope: &'a Scope,
    filter: Option<&'a UrlFilter>,
}

impl<'a> WalkScope<'a> {
    pub fn new(frontier: &'a Frontier, scope: &'a Scope, filter: Option<&'a UrlFilter>) -> Self {
        Self {
            frontier,
            scope,
            filter,
        }
    }

    /// Same host, under the scope prefix, and passing the include filter
    pub fn in_scope(&self, url: &str) -> bool {
        self.scope.contains(url) && self.filter.map_or(true, |f| f.matches(url))
    }

    /// Pushes in-scope links into the frontier, returning how many were new
    pub fn enqueue_discovered(&self, links: &[DiscoveredLink]) -> usize {
        links
            .iter()
            .filter(|link| self.in_scope(&link.url))
            .filter(|link| self.frontier.push((*link).clone()))
            .count()
    }
}

/// Counters reported after a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub dispatched: usize,
    pub handled: usize,
}

pub struct WalkCoordinator {
    config: WalkConfig,
}

impl WalkCoordinator {
    pub fn new(config: WalkConfig) -> Self {
        Self { config }
    }

    /// Walks the site rooted at `source`
    ///
    /// # Arguments
    ///
    /// * `cancel` - Stops dispatch when cancelled; partial work is still handled
    /// * `source` - Seed URL; its host and path define the walk scope
    /// * `filter` - Optional include-filter for discovered links
    /// * `fetcher` - Fetch strategy for every page
    /// * `processor` - Per-link work run on the workers
    /// * `handler` - Result consumer, run on the coordinator
    ///
    /// # Returns
    ///
    /// * `Ok(WalkSummary)` - The walk ended (exhausted, capped or cancelled)
    /// * `Err(HarvestError)` - Malformed source URL or invalid frontier sizing
    pub async fn walk(
        &self,
        cancel: &CancellationToken,
        source: &str,
        filter: Option<&UrlFilter>,
        fetcher: Arc<dyn Fetcher>,
        processor: Arc<dyn PageProcessor>,
        handler: &mut dyn ResultHandler,
    ) -> Result<WalkSummary> {
        let scope = Scope::from_source(source)?;
        let frontier = Frontier::new(self.config.frontier_capacity, self.config.false_positive_rate)?;
        frontier.push(DiscoveredLink::new(source, LinkPriority::Navigation));

        let walk_scope = WalkScope::new(&frontier, &scope, filter);
        let concurrency = self.config.concurrency.max(1);

        let (work_tx, work_rx) = mpsc::channel::<DiscoveredLink>(concurrency);
        let (result_tx, mut result_rx) = mpsc::channel::<PageResult>(1);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let mut workers = JoinSet::new();
        for id in 0..concurrency {
            workers.spawn(run_worker(
                id,
                cancel.clone(),
                Arc::clone(&work_rx),
                result_tx.clone(),
                Arc::clone(&fetcher),
                Arc::clone(&processor),
            ));
        }
        drop(result_tx);

        let mut summary = WalkSummary::default();
        let mut pending = 0usize;
        let mut next = frontier.pop();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let can_dispatch = next.is_some() && summary.dispatched < self.config.max_urls;
            if !can_dispatch && pending == 0 {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,

                permit = work_tx.reserve(), if can_dispatch => {
                    let Ok(permit) = permit else {
                        tracing::warn!("all walk workers exited");
                        break;
                    };
                    if let Some(link) = next.take() {
                        tracing::debug!(url = %link.url, priority = ?link.priority, "dispatch");
                        permit.send(link);
                        summary.dispatched += 1;
                        pending += 1;
                    }
                    next = frontier.pop();
                }

                result = result_rx.recv(), if pending > 0 => {
                    let Some(result) = result else {
                        break;
                    };
                    pending -= 1;
                    summary.handled += 1;
                    tracing::debug!(url = %result.url, ok = result.is_success(), "result");
                    handler.handle(&walk_scope, result).await;
                    if next.is_none() {
                        next = frontier.pop();
                    }
                }
            }
        }

        if summary.dispatched >= self.config.max_urls && next.is_some() {
            tracing::info!(max_urls = self.config.max_urls, "URL cap reached");
        }

        // Shutdown: close the work queue, then drain what is already in flight
        drop(work_tx);
        let deadline = tokio::time::Instant::now() + self.config.drain_timeout;
        while pending > 0 {
            match tokio::time::timeout_at(deadline, result_rx.recv()).await {
                Ok(Some(result)) => {
                    pending -= 1;
                    summary.handled += 1;
                    handler.handle(&walk_scope, result).await;
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(pending, "drain timeout, abandoning in-flight pages");
                    break;
                }
            }
        }
        workers.abort_all();

        tracing::info!(
            dispatched = summary.dispatched,
            handled = summary.handled,
            "walk finished"
        );

        Ok(summary)
    }
}

async fn run_worker(
    id: usize,
    cancel: CancellationToken,
    work_rx: Arc<Mutex<mpsc::Receiver<DiscoveredLink>>>,
    result_tx: mpsc::Sender<PageResult>,
    fetcher: Arc<dyn Fetcher>,
    processor: Arc<dyn PageProcessor>,
) {
    loop {
        let link = { work_rx.lock().await.recv().await };
        let Some(link) = link else {
            break;
        };

        // Queued before cancellation, never started
        if cancel.is_cancelled() {
            continue;
        }

        let result = processor.process(&cancel, link, Arc::clone(&fetcher)).await;

        tokio::select! {
            biased;
            sent = result_tx.send(result) => {
                if sent.is_err() {
                    break;
                }
            }
            _ = cancel.cancelled() => break,
        }
    }

    tracing::trace!(worker = id, "walk worker exiting");
}
