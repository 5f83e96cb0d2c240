//! # Upstream Transport
//!
//! The resolver depends only on a `fetch` capability. Auth material and
//! query parameters are baked into the request URL by the candidate that
//! built it, so the transport stays oblivious to provider details.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

use crate::error::FetchError;

/// One fully-formed upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    /// Per-attempt budget, enforced by the caller as well as the transport.
    pub timeout: Duration,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PayloadFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError>;
}

/// Production fetcher backed by a shared connection pool.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("exogen/0.1"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayloadFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError> {
        let response = self
            .client
            .get(&request.url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| classify(e, request.timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| classify(e, request.timeout))
    }
}

fn classify(error: reqwest::Error, budget: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(budget)
    } else {
        FetchError::Network(error.to_string())
    }
}
