//! Fetching review and listing pages.
//!
//! A [`PageSource`] turns a page URL into its HTML. Pulling reviews out of
//! that HTML is left to [`crate::sources`].
//!
//! [`HttpFetcher`] talks to the sites through `reqwest`. [`RetryFetch`] wraps
//! any page source and repeats a request that failed for a reason likely to
//! go away: a dropped connection, a timeout, 429 or a 5xx. A 404 is not
//! retried. It comes back as `Ok(None)`, and the caller decides whether the
//! missing page ends a section or fails the venue.

use rand::{Rng, rng};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::error::FetchError;

/// Browser-like User-Agent; both sites serve stripped pages to unknown agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Trait for async page retrieval.
///
/// Implementors return the page body, `None` for a missing page (HTTP 404),
/// or a [`FetchError`] for anything else that went wrong.
pub trait PageSource {
    async fn get_page(&self, url: &Url) -> Result<Option<String>, FetchError>;
}

/// `reqwest`-backed [`PageSource`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}

impl PageSource for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get_page(&self, url: &Url) -> Result<Option<String>, FetchError> {
        let t0 = Instant::now();
        let response = self.client.get(url.clone()).send().await.map_err(classify)?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(elapsed_ms = t0.elapsed().as_millis(), "Page not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Fetched page"
        );
        Ok(Some(body))
    }
}

/// Repeats transient page failures with a growing pause.
///
/// The n-th retry waits `base_delay * 2^(n-1)`, at most 30 seconds, plus up
/// to 250ms of jitter so parallel jobs do not retry in lockstep.
pub struct RetryFetch<T> {
    inner: T,
    /// Retries after the first attempt.
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: PageSource,
{
    /// Fetch through `inner`, trying a page at most `max_retries + 1` times.
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Pause before retry number `retry`, counting from 1.
    fn backoff(&self, retry: usize) -> Duration {
        let exponent = u32::try_from(retry.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        let base = self.base_delay.saturating_mul(1 << exponent).min(self.max_delay);
        base + Duration::from_millis(rng().random_range(0..=250))
    }
}

impl<T> PageSource for RetryFetch<T>
where
    T: PageSource,
{
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get_page(&self, url: &Url) -> Result<Option<String>, FetchError> {
        let t0 = Instant::now();
        let mut retry = 0usize;

        loop {
            let e = match self.inner.get_page(url).await {
                Err(e) if e.is_transient() => e,
                other => return other,
            };

            retry += 1;
            if retry > self.max_retries {
                error!(
                    retries = self.max_retries,
                    elapsed_ms = t0.elapsed().as_millis(),
                    error = %e,
                    "Giving up on page"
                );
                return Err(e);
            }

            let delay = self.backoff(retry);
            warn!(
                retry,
                max = self.max_retries,
                elapsed_ms = t0.elapsed().as_millis(),
                ?delay,
                error = %e,
                "Page fetch failed; retrying"
            );
            sleep(delay).await;
        }
    }
}
