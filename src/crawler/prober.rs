//! One-shot choice between plain HTTP and browser-rendered fetching
//!
//! The decision is made once per crawl from a single probe URL and reused
//! for every page of the run.

use crate::crawler::Fetcher;
use crate::extract::{Extractor, FrameworkDetector};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Fetch strategy selected for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Http,
    Browser,
}

/// Browser content must exceed this multiple of the HTTP content to count as different
const CONTENT_RATIO_THRESHOLD: f64 = 1.5;

pub struct FetchStrategyProber {
    http: Arc<dyn Fetcher>,
    browser: Option<Arc<dyn Fetcher>>,
    detector: Arc<dyn FrameworkDetector>,
    extractor: Arc<dyn Extractor>,
}

impl FetchStrategyProber {
    /// Creates a prober; without a browser fetcher every probe picks HTTP
    pub fn new(
        http: Arc<dyn Fetcher>,
        browser: Option<Arc<dyn Fetcher>>,
        detector: Arc<dyn FrameworkDetector>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            http,
            browser,
            detector,
            extractor,
        }
    }

    /// Decides which strategy `url`'s site needs
    ///
    /// 1. HTTP fetch; failure commits to the browser.
    /// 2. A framework with a known rendering requirement decides directly.
    /// 3. Otherwise the page is also rendered in the browser and the
    ///    extracted main content of both variants is compared.
    pub async fn probe(&self, cancel: &CancellationToken, url: &str) -> FetchStrategy {
        let Some(browser) = &self.browser else {
            return FetchStrategy::Http;
        };

        let http_html = match self.http.fetch(cancel, url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::info!(url, "HTTP probe failed, using browser: {e}");
                return FetchStrategy::Browser;
            }
        };

        let framework = self.detector.detect(&http_html);
        if let Some(requires_js) = framework.requires_js() {
            tracing::info!(url, %framework, requires_js, "framework detected");
            return if requires_js {
                FetchStrategy::Browser
            } else {
                FetchStrategy::Http
            };
        }

        let rendered_html = match browser.fetch(cancel, url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::info!(url, "browser probe failed, using HTTP: {e}");
                return FetchStrategy::Http;
            }
        };

        if content_differs(&http_html, &rendered_html, self.extractor.as_ref()) {
            tracing::info!(url, "rendered content differs, using browser");
            FetchStrategy::Browser
        } else {
            tracing::info!(url, "rendered content matches, using HTTP");
            FetchStrategy::Http
        }
    }

    /// Probes `url` and returns the fetcher to use for the whole run
    pub async fn select(&self, cancel: &CancellationToken, url: &str) -> Arc<dyn Fetcher> {
        match (self.probe(cancel, url).await, &self.browser) {
            (FetchStrategy::Browser, Some(browser)) => Arc::clone(browser),
            _ => Arc::clone(&self.http),
        }
    }
}

/// Whether browser rendering produced meaningfully more main content
///
/// Any extraction error, or empty HTTP content next to non-empty rendered
/// content, counts as different. Otherwise the rendered content must be
/// strictly longer than 1.5x the HTTP content.
pub fn content_differs(http_html: &str, rendered_html: &str, extractor: &dyn Extractor) -> bool {
    let (http, rendered) = match (extractor.extract(http_html), extractor.extract(rendered_html)) {
        (Ok(http), Ok(rendered)) => (http, rendered),
        _ => return true,
    };

    let http_len = http.content.trim().len();
    let rendered_len = rendered.content.trim().len();

    if http_len == 0 && rendered_len > 0 {
        return true;
    }

    rendered_len as f64 > http_len as f64 * CONTENT_RATIO_THRESHOLD
}
