//! Integration tests for the crawler
//!
//! Scheduler behaviour is exercised end-to-end through `Crawler` with
//! in-process fetchers and sitemaps; the HTTP adapters are tested against
//! wiremock servers.

use async_trait::async_trait;
use docharvest::crawler::{
    build_http_client, Collaborators, CrawlSettings, DomainLimiter, FetchError, Fetcher,
    HttpFetcher,
};
use docharvest::extract::{HtmdConverter, LinkRegistry, MainContentExtractor, MarkerDetector};
use docharvest::sitemap::{SitemapError, SitemapSource};
use docharvest::storage::{NewDocument, SqliteStorage, Storage};
use docharvest::tokens::ApproxTokenCounter;
use docharvest::{config::UserAgentConfig, Crawler, HarvestError, ProgressEvent, ProgressKind, UrlFilter};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ===== Test doubles =====

/// Serves pages from a map; unknown URLs are 404s
#[derive(Default)]
struct MapFetcher {
    pages: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
    cancel_on_first: Option<CancellationToken>,
}

impl MapFetcher {
    fn with_pages(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, html)| (url.to_string(), html.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn fetched(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn fetch(&self, _cancel: &CancellationToken, url: &str) -> Result<String, FetchError> {
        let first = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(url.to_string());
            calls.len() == 1
        };
        if first {
            if let Some(token) = &self.cancel_on_first {
                token.cancel();
            }
        }

        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Every page links to 100 fresh pages below it
#[derive(Default)]
struct FanOutFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for FanOutFetcher {
    async fn fetch(&self, _cancel: &CancellationToken, url: &str) -> Result<String, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let links: String = (0..100)
            .map(|i| format!(r#"<a href="/docs/p{}-{}">link</a>"#, n, i))
            .collect();
        Ok(format!(
            "<html><head><title>{}</title></head><body><main><p>page</p>{}</main></body></html>",
            url, links
        ))
    }
}

/// Fails a fixed number of times before serving a page
struct FlakyFetcher {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for FlakyFetcher {
    async fn fetch(&self, _cancel: &CancellationToken, url: &str) -> Result<String, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }
        Ok("<html><head><title>Flaky</title></head><body><p>Finally</p></body></html>".to_string())
    }
}

enum SitemapReply {
    Urls(Vec<String>),
    Fail,
}

struct StaticSitemap(SitemapReply);

impl StaticSitemap {
    fn empty() -> Arc<Self> {
        Arc::new(Self(SitemapReply::Urls(Vec::new())))
    }

    fn with(urls: &[&str]) -> Arc<Self> {
        Arc::new(Self(SitemapReply::Urls(
            urls.iter().map(|u| u.to_string()).collect(),
        )))
    }
}

#[async_trait]
impl SitemapSource for StaticSitemap {
    async fn discover_urls(
        &self,
        _cancel: &CancellationToken,
        _base_url: &str,
        _filter: Option<&UrlFilter>,
    ) -> Result<Vec<String>, SitemapError> {
        match &self.0 {
            SitemapReply::Urls(urls) => Ok(urls.clone()),
            SitemapReply::Fail => Err(SitemapError::Status {
                url: "https://example.com/sitemap.xml".to_string(),
                status: 500,
            }),
        }
    }
}

// ===== Helpers =====

fn create_test_settings(concurrency: usize) -> CrawlSettings {
    CrawlSettings {
        concurrency,
        discovery_concurrency: concurrency,
        retry_delays: vec![Duration::from_millis(1); 2],
        drain_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

fn create_test_crawler(
    settings: CrawlSettings,
    sitemap: Arc<dyn SitemapSource>,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<SqliteStorage>,
) -> Crawler {
    let detector = Arc::new(MarkerDetector::new());
    Crawler::new(
        settings,
        Collaborators {
            sitemap,
            http: fetcher,
            browser: None,
            links: Arc::new(LinkRegistry::new(detector.clone())),
            detector,
            extractor: Arc::new(MainContentExtractor::new()),
            converter: Arc::new(HtmdConverter::new()),
            store,
            tokens: Arc::new(ApproxTokenCounter),
        },
    )
}

fn create_test_store(source_url: &str, filters: &str) -> (Arc<SqliteStorage>, docharvest::storage::Project) {
    let store = Arc::new(SqliteStorage::new_in_memory().unwrap());
    store.create_project("docs", source_url, filters).unwrap();
    let project = store.get_project("docs").unwrap();
    (store, project)
}

fn page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|l| format!(r#"<a href="{}">{}</a>"#, l, l))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><nav>{}</nav><main><h1>{}</h1><p>Content of {}.</p></main></body></html>",
        title, anchors, title, title
    )
}

fn docs_site() -> MapFetcher {
    MapFetcher::with_pages(&[
        (
            "https://example.com/docs/",
            &page(
                "Home",
                &[
                    "/docs/page1",
                    "/docs/page2",
                    "https://other.com/docs/elsewhere",
                    "/blog/post",
                ],
            ),
        ),
        (
            "https://example.com/docs/page1",
            &page("Page 1", &["/docs/page3", "/docs/", "/docs/page2#intro"]),
        ),
        ("https://example.com/docs/page2", &page("Page 2", &[])),
        ("https://example.com/docs/page3", &page("Page 3", &[])),
        ("https://example.com/blog/post", &page("Blog", &[])),
    ])
}

fn recorder() -> (Arc<Mutex<Vec<ProgressEvent>>>, impl FnMut(ProgressEvent) + Send) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    (events, move |event| sink.lock().unwrap().push(event))
}

// ===== Scheduler scenarios =====

#[tokio::test]
async fn test_walk_end_to_end() {
    let (store, project) = create_test_store("https://example.com/docs/", "");
    let fetcher = Arc::new(docs_site());
    let crawler = create_test_crawler(
        create_test_settings(4),
        StaticSitemap::empty(),
        fetcher.clone(),
        store.clone(),
    );

    let (events, mut sink) = recorder();
    let result = crawler
        .crawl_project(&CancellationToken::new(), &project, &mut sink)
        .await
        .unwrap();

    assert_eq!(result.saved, 4);
    assert_eq!(result.failed, 0);
    assert!(result.bytes > 0);
    assert!(result.tokens > 0);

    // Out-of-scope links were never fetched
    assert_eq!(
        fetcher.fetched(),
        vec![
            "https://example.com/docs/",
            "https://example.com/docs/page1",
            "https://example.com/docs/page2",
            "https://example.com/docs/page3",
        ]
    );

    let mut stored: Vec<_> = store
        .list_documents(project.id)
        .unwrap()
        .into_iter()
        .map(|d| d.source_url)
        .collect();
    stored.sort();
    assert_eq!(stored, fetcher.fetched());

    // Completion-order positions are 0..n without gaps
    let mut positions: Vec<_> = store
        .list_documents(project.id)
        .unwrap()
        .into_iter()
        .map(|d| d.position)
        .collect();
    positions.sort();
    assert_eq!(positions, vec![0, 1, 2, 3]);

    let events = events.lock().unwrap();
    assert!(events.iter().all(|e| e.kind != ProgressKind::Started));
    assert_eq!(events.iter().filter(|e| e.kind == ProgressKind::Completed).count(), 4);
    assert!(events.iter().all(|e| e.total == 0));
    assert_eq!(events.last().unwrap().kind, ProgressKind::Finished);
}

#[tokio::test]
async fn test_walk_applies_project_filter() {
    let (store, project) = create_test_store("https://example.com/docs/", "page1\npage3");
    let fetcher = Arc::new(docs_site());
    let crawler = create_test_crawler(
        create_test_settings(2),
        StaticSitemap::empty(),
        fetcher.clone(),
        store,
    );

    let (_, mut sink) = recorder();
    let result = crawler
        .crawl_project(&CancellationToken::new(), &project, &mut sink)
        .await
        .unwrap();

    // The seed is always visited; discovered links must pass the filter
    assert_eq!(result.saved, 3);
    assert_eq!(
        fetcher.fetched(),
        vec![
            "https://example.com/docs/",
            "https://example.com/docs/page1",
            "https://example.com/docs/page3",
        ]
    );
}

#[tokio::test]
async fn test_single_url_sitemap_progress_sequence() {
    let (store, project) = create_test_store("https://example.com/docs/", "");
    let crawler = create_test_crawler(
        create_test_settings(2),
        StaticSitemap::with(&["https://example.com/docs/page2"]),
        Arc::new(docs_site()),
        store,
    );

    let (events, mut sink) = recorder();
    let result = crawler
        .crawl_project(&CancellationToken::new(), &project, &mut sink)
        .await
        .unwrap();
    assert_eq!(result.saved, 1);

    let events = events.lock().unwrap();
    let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![ProgressKind::Started, ProgressKind::Completed, ProgressKind::Finished]
    );
    assert_eq!(events[0].total, 1);
    assert_eq!(events[1].completed, 1);
    assert_eq!(events[1].url, "https://example.com/docs/page2");
}

#[tokio::test]
async fn test_sitemap_positions_follow_input_order() {
    let (store, project) = create_test_store("https://example.com/docs/", "");
    let urls = [
        "https://example.com/docs/page3",
        "https://example.com/docs/missing",
        "https://example.com/docs/",
        "https://example.com/docs/page1",
    ];
    let crawler = create_test_crawler(
        create_test_settings(4),
        StaticSitemap::with(&urls),
        Arc::new(docs_site()),
        store.clone(),
    );

    let (events, mut sink) = recorder();
    let result = crawler
        .crawl_project(&CancellationToken::new(), &project, &mut sink)
        .await
        .unwrap();

    assert_eq!(result.saved, 3);
    assert_eq!(result.failed, 1);

    let stored: Vec<_> = store
        .list_documents(project.id)
        .unwrap()
        .into_iter()
        .map(|d| (d.position, d.source_url))
        .collect();
    assert_eq!(
        stored,
        vec![
            (0, "https://example.com/docs/page3".to_string()),
            (2, "https://example.com/docs/".to_string()),
            (3, "https://example.com/docs/page1".to_string()),
        ]
    );

    let events = events.lock().unwrap();
    let failed: Vec<_> = events
        .iter()
        .filter(|e| e.kind == ProgressKind::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].url, "https://example.com/docs/missing");
    assert!(failed[0].error.as_deref().unwrap().contains("404"));
    assert_eq!(events.last().unwrap().completed, 4);
}

#[tokio::test]
async fn test_cancellation_mid_sitemap_run() {
    let (store, project) = create_test_store("https://example.com/docs/", "");
    let cancel = CancellationToken::new();
    let fetcher = Arc::new(MapFetcher {
        cancel_on_first: Some(cancel.clone()),
        ..docs_site()
    });
    let crawler = create_test_crawler(
        create_test_settings(1),
        StaticSitemap::with(&[
            "https://example.com/docs/",
            "https://example.com/docs/page1",
            "https://example.com/docs/page2",
        ]),
        fetcher.clone(),
        store,
    );

    let (events, mut sink) = recorder();
    let result = crawler.crawl_project(&cancel, &project, &mut sink).await.unwrap();

    assert_eq!(result.saved, 1);
    assert_eq!(result.failed, 0);
    assert_eq!(fetcher.fetched().len(), 1);

    let events = events.lock().unwrap();
    assert_eq!(
        events.iter().filter(|e| e.kind == ProgressKind::Finished).count(),
        1
    );
}

#[tokio::test]
async fn test_cancellation_mid_sitemap_run_with_full_pool() {
    let (store, project) = create_test_store("https://example.com/docs/", "");
    let cancel = CancellationToken::new();
    let fetcher = Arc::new(MapFetcher {
        cancel_on_first: Some(cancel.clone()),
        ..docs_site()
    });
    // Every URL is queued before the first fetch runs
    let crawler = create_test_crawler(
        create_test_settings(CrawlSettings::default().concurrency),
        StaticSitemap::with(&[
            "https://example.com/docs/",
            "https://example.com/docs/page1",
            "https://example.com/docs/page2",
        ]),
        fetcher.clone(),
        store,
    );

    let (events, mut sink) = recorder();
    let result = crawler.crawl_project(&cancel, &project, &mut sink).await.unwrap();

    assert_eq!(result.saved, 1);
    assert_eq!(result.failed, 0);
    assert_eq!(fetcher.fetched().len(), 1);

    let events = events.lock().unwrap();
    assert!(events.iter().all(|e| e.kind != ProgressKind::Failed));
    assert_eq!(events.last().unwrap().kind, ProgressKind::Finished);
}

#[tokio::test]
async fn test_cancellation_mid_walk() {
    let (store, project) = create_test_store("https://example.com/docs/", "");
    let cancel = CancellationToken::new();
    let fetcher = Arc::new(MapFetcher {
        cancel_on_first: Some(cancel.clone()),
        ..docs_site()
    });
    let crawler = create_test_crawler(
        create_test_settings(1),
        StaticSitemap::empty(),
        fetcher.clone(),
        store,
    );

    let (_, mut sink) = recorder();
    let result = crawler.crawl_project(&cancel, &project, &mut sink).await.unwrap();

    assert_eq!(result.saved, 1);
    assert_eq!(fetcher.fetched(), vec!["https://example.com/docs/"]);
}

#[tokio::test]
async fn test_url_cap_bounds_dispatch() {
    let (store, project) = create_test_store("https://example.com/docs/", "");
    let fetcher = Arc::new(FanOutFetcher::default());
    let crawler = create_test_crawler(
        create_test_settings(10),
        StaticSitemap::empty(),
        fetcher.clone(),
        store,
    );

    let (_, mut sink) = recorder();
    let result = crawler
        .crawl_project(&CancellationToken::new(), &project, &mut sink)
        .await
        .unwrap();

    assert!(fetcher.calls.load(Ordering::SeqCst) <= 1000);
    assert_eq!(result.saved + result.failed, fetcher.calls.load(Ordering::SeqCst));
    assert!(result.saved <= 1000);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let (store, project) = create_test_store("https://example.com/docs/", "");
    let fetcher = Arc::new(FlakyFetcher {
        failures: 2,
        calls: AtomicUsize::new(0),
    });
    let crawler = create_test_crawler(
        create_test_settings(1),
        StaticSitemap::with(&["https://example.com/docs/flaky"]),
        fetcher.clone(),
        store,
    );

    let (_, mut sink) = recorder();
    let result = crawler
        .crawl_project(&CancellationToken::new(), &project, &mut sink)
        .await
        .unwrap();

    assert_eq!(result.saved, 1);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_invalid_filter_is_structural_error() {
    let (store, project) = create_test_store("https://example.com/docs/", "valid\n(unclosed");
    let crawler = create_test_crawler(
        create_test_settings(1),
        StaticSitemap::empty(),
        Arc::new(docs_site()),
        store,
    );

    let (events, mut sink) = recorder();
    let result = crawler
        .crawl_project(&CancellationToken::new(), &project, &mut sink)
        .await;

    match result {
        Err(HarvestError::InvalidFilter { pattern, .. }) => assert_eq!(pattern, "(unclosed"),
        other => panic!("expected InvalidFilter, got {:?}", other),
    }
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_source_url_is_structural_error() {
    let (store, project) = create_test_store("not a url", "");
    let crawler = create_test_crawler(
        create_test_settings(1),
        StaticSitemap::empty(),
        Arc::new(docs_site()),
        store,
    );

    let (_, mut sink) = recorder();
    let result = crawler
        .crawl_project(&CancellationToken::new(), &project, &mut sink)
        .await;
    assert!(matches!(result, Err(HarvestError::InvalidUrl { .. })));
}

#[tokio::test]
async fn test_sitemap_failure_is_structural_error() {
    let (store, project) = create_test_store("https://example.com/docs/", "");
    let crawler = create_test_crawler(
        create_test_settings(1),
        Arc::new(StaticSitemap(SitemapReply::Fail)),
        Arc::new(docs_site()),
        store,
    );

    let (_, mut sink) = recorder();
    let result = crawler
        .crawl_project(&CancellationToken::new(), &project, &mut sink)
        .await;
    assert!(matches!(result, Err(HarvestError::Sitemap(_))));
}

#[tokio::test]
async fn test_discover_urls() {
    let (store, _) = create_test_store("https://example.com/docs/", "");
    let fetcher = Arc::new(docs_site());
    let crawler = create_test_crawler(
        create_test_settings(2),
        StaticSitemap::empty(),
        fetcher,
        store.clone(),
    );

    let mut urls = crawler
        .discover_urls(
            &CancellationToken::new(),
            "https://example.com/docs/",
            &UrlFilter::default(),
        )
        .await
        .unwrap();
    urls.sort();

    assert_eq!(
        urls,
        vec![
            "https://example.com/docs/",
            "https://example.com/docs/page1",
            "https://example.com/docs/page2",
            "https://example.com/docs/page3",
        ]
    );
    // Discovery stores nothing
    let project = store.get_project("docs").unwrap();
    assert_eq!(store.count_documents(project.id).unwrap(), 0);
}

// ===== Re-crawls =====

fn insert_old_document(store: &SqliteStorage, project_id: i64, url: &str) -> i64 {
    store
        .insert_document(&NewDocument {
            project_id,
            source_url: url.to_string(),
            title: "Old".to_string(),
            content: "# Old".to_string(),
            content_hash: "0000000000000000".to_string(),
            position: 0,
        })
        .unwrap()
}

#[tokio::test]
async fn test_recrawl_replaces_previous_documents() {
    let (store, project) = create_test_store("https://example.com/docs/", "");
    let old_id = insert_old_document(&store, project.id, "https://example.com/docs/removed");
    let crawler = create_test_crawler(
        create_test_settings(2),
        StaticSitemap::with(&["https://example.com/docs/page1", "https://example.com/docs/page2"]),
        Arc::new(docs_site()),
        store.clone(),
    );

    let (_, mut sink) = recorder();
    let (result, retired) = crawler
        .recrawl_project(&CancellationToken::new(), &project, store.as_ref(), &mut sink)
        .await
        .unwrap();

    assert_eq!(result.saved, 2);
    assert_eq!(retired, 1);
    let documents = store.list_documents(project.id).unwrap();
    assert_eq!(documents.len(), 2);
    assert!(documents.iter().all(|d| d.id > old_id));
}

#[tokio::test]
async fn test_recrawl_keeps_documents_when_sitemap_fails() {
    let (store, project) = create_test_store("https://example.com/docs/", "");
    insert_old_document(&store, project.id, "https://example.com/docs/kept");
    let crawler = create_test_crawler(
        create_test_settings(2),
        Arc::new(StaticSitemap(SitemapReply::Fail)),
        Arc::new(docs_site()),
        store.clone(),
    );

    let (_, mut sink) = recorder();
    let result = crawler
        .recrawl_project(&CancellationToken::new(), &project, store.as_ref(), &mut sink)
        .await;

    assert!(matches!(result, Err(HarvestError::Sitemap(_))));
    let documents = store.list_documents(project.id).unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].source_url, "https://example.com/docs/kept");
}

#[tokio::test]
async fn test_recrawl_keeps_documents_when_cancelled() {
    let (store, project) = create_test_store("https://example.com/docs/", "");
    insert_old_document(&store, project.id, "https://example.com/docs/kept");
    let cancel = CancellationToken::new();
    let fetcher = Arc::new(MapFetcher {
        cancel_on_first: Some(cancel.clone()),
        ..docs_site()
    });
    let crawler = create_test_crawler(
        create_test_settings(1),
        StaticSitemap::with(&["https://example.com/docs/page1", "https://example.com/docs/page2"]),
        fetcher,
        store.clone(),
    );

    let (_, mut sink) = recorder();
    let (result, retired) = crawler
        .recrawl_project(&cancel, &project, store.as_ref(), &mut sink)
        .await
        .unwrap();

    assert_eq!(result.saved, 1);
    assert_eq!(retired, 0);
    assert_eq!(store.count_documents(project.id).unwrap(), 2);
}

// ===== HTTP adapters =====

fn create_test_http_fetcher(rate: f64) -> HttpFetcher {
    let config = UserAgentConfig {
        name: "TestBot".to_string(),
        version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
    };
    let client = build_http_client(&config, Duration::from_secs(5)).unwrap();
    HttpFetcher::new(client, Arc::new(DomainLimiter::new(rate)))
}

#[tokio::test]
async fn test_http_fetcher_against_mock_server() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/docs/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><p>Hello</p></body></html>")
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .insert_header("content-type", "application/json"),
        )
        .mount(&mock_server)
        .await;

    let fetcher = create_test_http_fetcher(100.0);
    let cancel = CancellationToken::new();

    let html = fetcher
        .fetch(&cancel, &format!("{}/docs/", base_url))
        .await
        .unwrap();
    assert!(html.contains("Hello"));

    let broken = fetcher.fetch(&cancel, &format!("{}/broken", base_url)).await;
    assert!(matches!(broken, Err(FetchError::Status { status: 500, .. })));

    let json = fetcher.fetch(&cancel, &format!("{}/data.json", base_url)).await;
    assert!(matches!(json, Err(FetchError::NotHtml { .. })));
}

#[tokio::test]
async fn test_http_fetcher_is_rate_limited_per_host() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>ok</body></html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let fetcher = create_test_http_fetcher(5.0);
    let cancel = CancellationToken::new();
    let url = format!("{}/a", mock_server.uri());

    fetcher.fetch(&cancel, &url).await.unwrap();
    let start = std::time::Instant::now();
    fetcher.fetch(&cancel, &url).await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(180));
}
