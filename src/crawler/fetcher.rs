//! Page fetchers
//!
//! This module defines the [`Fetcher`] capability used by the scheduler and
//! its plain-HTTP implementation:
//! - Building HTTP clients with proper user agent strings
//! - Per-host rate limiting before every request
//! - Status and Content-Type classification
//! - Cancellation of in-flight requests

use crate::config::UserAgentConfig;
use crate::crawler::DomainLimiter;
use crate::url::domain_of;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Per-URL fetch failure
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} is not HTML (Content-Type: {content_type})")]
    NotHtml { url: String, content_type: String },

    #[error("Cannot fetch invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Browser fetch of {url} failed: {message}")]
    Browser { url: String, message: String },

    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether this error only reflects cancellation of the run
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Retrieves the HTML of a page
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url`, returning the response body as HTML
    async fn fetch(&self, cancel: &CancellationToken, url: &str) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP fetcher
///
/// Waits on the shared [`DomainLimiter`] for the URL's host before each
/// request. Non-2xx responses become [`FetchError::Status`]; responses that
/// declare a non-HTML Content-Type become [`FetchError::NotHtml`]. A missing
/// Content-Type is accepted.
pub struct HttpFetcher {
    client: Client,
    limiter: Arc<DomainLimiter>,
}

impl HttpFetcher {
    pub fn new(client: Client, limiter: Arc<DomainLimiter>) -> Self {
        Self { client, limiter }
    }

    async fn fetch_inner(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Check Content-Type
        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_html_content_type(content_type) {
                return Err(FetchError::NotHtml {
                    url: url.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        response.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, cancel: &CancellationToken, url: &str) -> Result<String, FetchError> {
        let domain = domain_of(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;

        self.limiter.wait(cancel, &domain).await?;

        tracing::debug!(url, "http fetch");

        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.fetch_inner(url) => result,
        }
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            name: "TestHarvester".to_string(),
            version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let config = create_test_config();
        let client = build_http_client(&config, Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_is_html_content_type() {
        assert!(is_html_content_type("text/html"));
        assert!(is_html_content_type("text/html; charset=utf-8"));
        assert!(is_html_content_type("TEXT/HTML"));
        assert!(is_html_content_type("application/xhtml+xml"));
        assert!(!is_html_content_type("application/json"));
        assert!(!is_html_content_type("text/plain"));
    }

    #[test]
    fn test_fetch_error_is_cancelled() {
        assert!(FetchError::Cancelled.is_cancelled());
        assert!(!FetchError::Status {
            url: "https://example.com".to_string(),
            status: 500
        }
        .is_cancelled());
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let config = create_test_config();
        let client = build_http_client(&config, Duration::from_secs(5)).unwrap();
        let fetcher = HttpFetcher::new(client, Arc::new(DomainLimiter::new(10.0)));

        let result = fetcher.fetch(&CancellationToken::new(), "not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_when_cancelled() {
        let config = create_test_config();
        let client = build_http_client(&config, Duration::from_secs(5)).unwrap();
        let fetcher = HttpFetcher::new(client, Arc::new(DomainLimiter::new(10.0)));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetcher.fetch(&cancel, "https://example.com/").await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
