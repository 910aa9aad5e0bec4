//! Sitemap-based URL discovery
//!
//! Fetches `<origin>/sitemap.xml` and returns the page URLs it lists that
//! fall inside the crawl scope. A `<sitemapindex>` is followed one level
//! deep. A missing sitemap (HTTP 404) is not an error: it yields an empty
//! list, which tells the orchestrator to fall back to link following. The
//! same goes for a body that is not a sitemap, such as an HTML soft-404.

use crate::url::{Scope, UrlFilter};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use sxd_document::parser;
use sxd_xpath::{Context, Factory, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Errors from sitemap discovery
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("Invalid base URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Sitemap request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Sitemap {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Sitemap discovery cancelled")]
    Cancelled,
}

/// Source of a site's known page list
#[async_trait]
pub trait SitemapSource: Send + Sync {
    /// Lists in-scope page URLs, or an empty list when the site has no sitemap
    async fn discover_urls(
        &self,
        cancel: &CancellationToken,
        base_url: &str,
        filter: Option<&UrlFilter>,
    ) -> Result<Vec<String>, SitemapError>;
}

/// Root element of a sitemap document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SitemapKind {
    Index,
    Urlset,
}

/// `<loc>` values of one sitemap document, in document order
#[derive(Debug)]
struct ParsedSitemap {
    kind: SitemapKind,
    locations: Vec<String>,
}

/// Parses a sitemap or sitemap index
///
/// The kind comes from the root element name; `<loc>` elements are matched
/// by local name so sitemaps without the standard namespace still work.
fn parse_sitemap(xml: &str) -> Result<ParsedSitemap, String> {
    let package = parser::parse(xml).map_err(|e| format!("malformed XML: {e}"))?;
    let document = package.as_document();
    let root = document.root();

    let root_name = root
        .children()
        .into_iter()
        .find_map(|child| child.element())
        .map(|element| element.name().local_part().to_string());

    let kind = match root_name.as_deref() {
        Some("sitemapindex") => SitemapKind::Index,
        Some("urlset") => SitemapKind::Urlset,
        Some(other) => return Err(format!("unexpected root element <{other}>")),
        None => return Err("document has no root element".to_string()),
    };

    let xpath = Factory::new()
        .build("//*[local-name()='loc']")
        .map_err(|e| format!("invalid XPath: {e}"))?
        .ok_or_else(|| "missing XPath".to_string())?;

    let locations = match xpath.evaluate(&Context::new(), root) {
        Ok(Value::Nodeset(nodes)) => nodes
            .document_order()
            .iter()
            .map(|node| node.string_value().trim().to_string())
            .filter(|loc| !loc.is_empty())
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => return Err(format!("XPath evaluation failed: {e}")),
    };

    Ok(ParsedSitemap { kind, locations })
}

/// HTTP sitemap reader
pub struct SitemapDiscoverer {
    client: Client,
}

impl SitemapDiscoverer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetches a sitemap document; `Ok(None)` when it does not exist
    async fn fetch_document(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<Option<String>, SitemapError> {
        if cancel.is_cancelled() {
            return Err(SitemapError::Cancelled);
        }

        let request = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|source| SitemapError::Request {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(SitemapError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            response
                .text()
                .await
                .map(Some)
                .map_err(|source| SitemapError::Request {
                    url: url.to_string(),
                    source,
                })
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(SitemapError::Cancelled),
            result = request => result,
        }
    }

    /// Fetches and parses one sitemap; `Ok(None)` when there is no usable document
    async fn fetch_sitemap(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<Option<ParsedSitemap>, SitemapError> {
        let Some(xml) = self.fetch_document(cancel, url).await? else {
            return Ok(None);
        };

        match parse_sitemap(&xml) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                tracing::warn!(url, "ignoring sitemap: {e}");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl SitemapSource for SitemapDiscoverer {
    async fn discover_urls(
        &self,
        cancel: &CancellationToken,
        base_url: &str,
        filter: Option<&UrlFilter>,
    ) -> Result<Vec<String>, SitemapError> {
        let base = Url::parse(base_url).map_err(|source| SitemapError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        let scope = Scope::from_url(&base).ok_or_else(|| SitemapError::InvalidUrl {
            url: base_url.to_string(),
            source: url::ParseError::EmptyHost,
        })?;
        let sitemap_url = base
            .join("/sitemap.xml")
            .map_err(|source| SitemapError::InvalidUrl {
                url: base_url.to_string(),
                source,
            })?;

        let Some(root) = self.fetch_sitemap(cancel, sitemap_url.as_str()).await? else {
            tracing::debug!(url = %sitemap_url, "no sitemap");
            return Ok(Vec::new());
        };

        let candidates = match root.kind {
            SitemapKind::Urlset => root.locations,
            SitemapKind::Index => {
                let mut candidates = Vec::new();
                for child in &root.locations {
                    match self.fetch_sitemap(cancel, child).await? {
                        Some(parsed) if parsed.kind == SitemapKind::Urlset => {
                            candidates.extend(parsed.locations)
                        }
                        Some(_) => tracing::warn!(url = %child, "nested sitemap index skipped"),
                        None => tracing::warn!(url = %child, "sitemap listed in index not usable"),
                    }
                }
                candidates
            }
        };

        let urls = select_urls(candidates, &scope, filter);
        tracing::info!(url = %sitemap_url, count = urls.len(), "sitemap discovery finished");
        Ok(urls)
    }
}

/// Keeps in-scope, filter-passing URLs, deduplicated in input order
fn select_urls(candidates: Vec<String>, scope: &Scope, filter: Option<&UrlFilter>) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|loc| scope.contains(loc))
        .filter(|loc| filter.map_or(true, |f| f.matches(loc)))
        .filter(|loc| seen.insert(loc.clone()))
        .collect()
}
