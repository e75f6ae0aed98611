//! HTTP(S) GETs against the package registry and listing pages.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{HydrationError, HydrationResult};

/// Default HTTP request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Accept header for registry metadata requests.
pub const ACCEPT_JSON: &str = "application/json";

/// A fully-read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a GET produced no response.
///
/// Kept separate from [`HydrationError`] so callers that degrade gracefully
/// can tell a failed request from a failed body read.
#[derive(Debug, thiserror::Error)]
pub enum FetchFailure {
    /// The request never produced a response (DNS, TLS, connect, timeout).
    #[error("request failed: {0}")]
    Request(String),
    /// A response arrived but its body could not be read.
    #[error("response read failed: {0}")]
    Body(String),
    /// The owning request was cancelled.
    #[error("request cancelled")]
    Cancelled,
}

/// Performs GETs.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    async fn get(
        &self,
        url: &str,
        accept: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, FetchFailure>;
}

/// [`NetworkFetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher with the given timeout and user agent.
    pub fn new(timeout: Duration, user_agent: &str) -> HydrationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                HydrationError::network("Failed to build HTTP client").with_source(e)
            })?;
        Ok(Self { client })
    }

    pub fn with_defaults() -> HydrationResult<Self> {
        Self::new(DEFAULT_TIMEOUT, concat!("quarry/", env!("CARGO_PKG_VERSION")))
    }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
    async fn get(
        &self,
        url: &str,
        accept: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, FetchFailure> {
        debug!(url, "GET");

        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| FetchFailure::Request(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| FetchFailure::Body(e.to_string()))?;
            Ok::<_, FetchFailure>(HttpResponse { status, body })
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FetchFailure::Cancelled),
            result = exchange => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_covers_2xx_only() {
        let ok = HttpResponse {
            status: 204,
            body: String::new(),
        };
        let redirect = HttpResponse {
            status: 301,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
    }

    #[test]
    fn default_fetcher_builds() {
        assert!(HttpFetcher::with_defaults().is_ok());
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let fetcher = HttpFetcher::with_defaults().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Unroutable address; the cancelled branch wins before any timeout.
        let result = fetcher.get("http://10.255.255.1/", None, &cancel).await;
        assert!(matches!(result, Err(FetchFailure::Cancelled)));
    }
}
