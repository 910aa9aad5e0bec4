//! Browser-rendered fetcher backed by headless Chrome
//!
//! The browser is launched lazily on the first fetch and shared by every
//! later fetch from the same [`BrowserFetcher`]. Each fetch opens its own
//! page and closes it afterwards.

use crate::config::BrowserConfig;
use crate::crawler::{DomainLimiter, FetchError, Fetcher};
use crate::url::domain_of;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct BrowserFetcher {
    config: BrowserConfig,
    limiter: Arc<DomainLimiter>,
    browser: OnceCell<Browser>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl BrowserFetcher {
    pub fn new(config: BrowserConfig, limiter: Arc<DomainLimiter>) -> Self {
        Self {
            config,
            limiter,
            browser: OnceCell::new(),
            handler: Mutex::new(None),
        }
    }

    fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.config.navigation_timeout_secs)
    }

    async fn browser(&self) -> Result<&Browser, String> {
        self.browser.get_or_try_init(|| self.launch()).await
    }

    async fn launch(&self) -> Result<Browser, String> {
        tracing::info!("Launching headless browser");

        let user_data_dir: PathBuf =
            std::env::temp_dir().join(format!("docharvest_chrome_{}", std::process::id()));

        let mut builder = ChromeConfig::builder()
            .request_timeout(self.navigation_timeout())
            .user_data_dir(user_data_dir)
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .arg("--mute-audio");

        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        let chrome_config = builder
            .build()
            .map_err(|e| format!("invalid browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| format!("failed to launch browser: {e}"))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("browser handler event error: {e}");
                }
            }
            tracing::debug!("Browser handler task completed");
        });

        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler_task);

        Ok(browser)
    }

    async fn render(&self, url: &str) -> Result<String, String> {
        let browser = self.browser().await?;

        let page = browser
            .new_page(url)
            .await
            .map_err(|e| format!("failed to open page: {e}"))?;

        let content = async {
            page.wait_for_navigation()
                .await
                .map_err(|e| format!("navigation failed: {e}"))?;
            page.content()
                .await
                .map_err(|e| format!("failed to read content: {e}"))
        }
        .await;

        if let Err(e) = page.close().await {
            tracing::debug!(url, "failed to close page: {e}");
        }

        content
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, cancel: &CancellationToken, url: &str) -> Result<String, FetchError> {
        let domain = domain_of(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;

        self.limiter.wait(cancel, &domain).await?;

        tracing::debug!(url, "browser fetch");

        let render = tokio::time::timeout(self.navigation_timeout(), self.render(url));

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            outcome = render => outcome,
        };

        match outcome {
            Ok(Ok(html)) => Ok(html),
            Ok(Err(message)) => Err(FetchError::Browser {
                url: url.to_string(),
                message,
            }),
            Err(_) => Err(FetchError::Browser {
                url: url.to_string(),
                message: format!(
                    "navigation timed out after {}s",
                    self.config.navigation_timeout_secs
                ),
            }),
        }
    }
}

impl Drop for BrowserFetcher {
    fn drop(&mut self) {
        if let Some(handler) = self
            .handler
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handler.abort();
        }
    }
}
