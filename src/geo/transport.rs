//! HTTP transport used by the geocoding client and IP locator
//!
//! The client only needs "GET this URL, give me the body", so that is the
//! whole seam. Tests swap in `test_support::StubTransport`.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;

const USER_AGENT: &str = concat!("rescue-geo/", env!("CARGO_PKG_VERSION"));

/// Trait for HTTP GET transports
pub trait Transport: Send + Sync {
    /// Fetch `url` and return the response body
    ///
    /// Connection failures map to [`Error::Network`]; non-2xx statuses map to
    /// [`Error::RemoteService`] with an `HTTP_<status>` code.
    fn get(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::remote(
                format!("HTTP_{}", status.as_u16()),
                status.canonical_reason().unwrap_or("unexpected status"),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Network(format!("failed to read body: {}", e.without_url())))
    }
}
