use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::models::RequestHeaders;

// ── Transport seam ────────────────────────────────────────────────────────────

/// Status and body of a single GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// The request never produced a usable response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// One network round trip. Swappable so the retry logic can run offline.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &Url,
        headers: &RequestHeaders,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError>;
}

pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let inner = reqwest::Client::builder()
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &Url,
        headers: &RequestHeaders,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        let mut req = self.inner.get(url.clone()).timeout(timeout);
        for (name, value) in headers.iter() {
            req = req.header(name, value);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| TransportError(format!("request error: {e}")))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError(format!("failed to read response body: {e}")))?;

        Ok(RawResponse { status, body })
    }
}

// ── Fetcher ───────────────────────────────────────────────────────────────────

/// Page-level failure. Nothing downstream of a failed fetch is produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("not found (404): {url}")]
    NotFound { url: String },

    #[error("retries exhausted after {attempts} attempt(s): {url}")]
    RetriesExhausted { url: String, attempts: u32 },

    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
}

/// GET with 404/429 classification and a constant cooldown between retries.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
}

impl HttpClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn reqwest() -> Result<Self, TransportError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new()?)))
    }

    /// Fetch `url` as text.
    ///
    /// * 404 fails at once with [`FetchError::NotFound`].
    /// * A `max_retries` of zero fails with [`FetchError::RetriesExhausted`]
    ///   after the first response, whatever its status (except 404).
    /// * 429 sleeps for `timeout` and tries again, at most `max_retries`
    ///   times; one more 429 fails with [`FetchError::RetriesExhausted`].
    /// * Any other status is returned as a body.
    ///
    /// At most `max_retries + 1` requests are made and at most
    /// `max_retries * timeout` is spent sleeping.
    pub async fn fetch_text(
        &self,
        url: &Url,
        headers: &RequestHeaders,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<String, FetchError> {
        let mut retries: u32 = 0;

        loop {
            let attempt = retries.saturating_add(1);
            debug!("GET {} (attempt {})", url, attempt);

            let resp = self
                .transport
                .get(url, headers, timeout)
                .await
                .map_err(|source| {
                    warn!("(err) GET {}: {}", url, source);
                    FetchError::Transport {
                        url: url.to_string(),
                        source,
                    }
                })?;

            match resp.status {
                404 => {
                    warn!("(404) path: {}", url);
                    return Err(FetchError::NotFound {
                        url: url.to_string(),
                    });
                }
                _ if max_retries == 0 => {
                    warn!("retry budget is zero, giving up on {}", url);
                    return Err(FetchError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: attempt,
                    });
                }
                429 if !retry_allowed(retries, max_retries) => {
                    warn!("(429) maximum retries exceeded: {}", url);
                    return Err(FetchError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: attempt,
                    });
                }
                429 => {
                    warn!("(429) cooling for {:?}: {}", timeout, url);
                    sleep(timeout).await;
                    retries += 1;
                }
                status => {
                    if !(200..300).contains(&status) {
                        debug!("unexpected status {} for {}, parsing anyway", status, url);
                    }
                    debug!("(success) GET {}", url);
                    return Ok(resp.body);
                }
            }
        }
    }
}

/// Whether another 429 cooldown fits in the budget. `retries` never
/// exceeds `max_retries`, so the count cannot overflow.
fn retry_allowed(retries: u32, max_retries: u32) -> bool {
    retries < max_retries
}

// ── Test support ──────────────────────────────────────────────────────────────
