//! HTTP fetcher used by resource boxes to pull remote payloads.
//!
//! The cache core only ever needs one capability from the network: a single
//! GET returning the raw body. That capability is the [`Fetch`] trait, so
//! tests and embedders can swap the transport without touching the cache.

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use super::FetchError;

/// HTTP request timeout in seconds.
/// 30s allows for slow CDN responses while failing fast enough for good UX.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A network-fetch capability: one GET, raw bytes back.
pub trait Fetch: Send + Sync {
    fn get<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Bytes, FetchError>>;
}

/// `Fetch` implementation backed by `reqwest`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default request timeout
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn get_bytes(&self, url: &Url) -> Result<Bytes, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }
        debug!(url = %url, "GET");
        let response = self.client.get(url.clone()).send().await?;

        // Only a plain 200 counts; 204/206 and friends are not a payload.
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status, &body));
        }

        let bytes = response.bytes().await?;
        debug!(url = %url, len = bytes.len(), "GET complete");
        Ok(bytes)
    }
}

impl Fetch for HttpFetcher {
    fn get<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        self.get_bytes(url).boxed()
    }
}
