//! Bounded exponential-backoff retry for fetch operations

use crate::crawler::FetchError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Production backoff: 1s, 2s, 4s (three retries)
pub const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Callback invoked before each retry with the retry number (1-based) and the error
pub type RetryLog<'a> = &'a (dyn Fn(usize, &FetchError) + Send + Sync);

/// Runs `fetch` up to `delays.len() + 1` times
///
/// Returns the first success. Between attempts the token is checked before
/// sleeping and the sleep itself is raced against cancellation; either path
/// returns `FetchError::Cancelled` immediately. `on_retry` runs once per
/// retry, never for the initial attempt or the final failure.
///
/// # Returns
///
/// * `Ok(T)` - An attempt succeeded
/// * `Err(FetchError)` - The last attempt's error, or `Cancelled`
pub async fn fetch_with_retry<T, F, Fut>(
    cancel: &CancellationToken,
    url: &str,
    mut fetch: F,
    on_retry: Option<RetryLog<'_>>,
    delays: &[Duration],
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut last_error = match fetch().await {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    for (index, delay) in delays.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let retry = index + 1;
        if let Some(log) = on_retry {
            log(retry, &last_error);
        }
        tracing::debug!(url, retry, ?delay, error = %last_error, "retrying fetch");

        tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            _ = tokio::time::sleep(*delay) => {}
        }

        match fetch().await {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}
