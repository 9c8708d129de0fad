//! HTTP transport abstraction for image fetching.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::error;

/// Transport-level failure for a single image fetch.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP status {0}")]
    Status(u16),
    /// The request never produced a usable body (connect, timeout, read).
    #[error("{0}")]
    Transport(String),
}

/// Abstraction over the HTTP transport so the pipeline can be exercised
/// without a network.
pub trait TileFetcher: Send + Sync {
    /// Fetches the raw bytes behind `url`.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Browser-style User-Agent. Some image hosts reject requests that carry a
/// library default.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Real fetcher backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, error::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| error::Error::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl TileFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Serves canned responses keyed by URL; unknown URLs get a 404.
    #[derive(Clone, Default)]
    pub struct StaticFetcher {
        pub responses: HashMap<String, Result<Vec<u8>, FetchError>>,
    }

    impl StaticFetcher {
        pub fn with_response(url: &str, response: Result<Vec<u8>, FetchError>) -> Self {
            let mut fetcher = Self::default();
            fetcher.responses.insert(url.to_string(), response);
            fetcher
        }
    }

    impl TileFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.responses
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::Status(404)))
        }
    }

    #[tokio::test]
    async fn static_fetcher_serves_canned_bytes() {
        let fetcher = StaticFetcher::with_response("http://img/a", Ok(vec![1, 2, 3]));
        assert_eq!(fetcher.fetch("http://img/a").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn static_fetcher_falls_back_to_not_found() {
        let fetcher = StaticFetcher::default();
        let err = fetcher.fetch("http://img/missing").await.unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
    }

    #[test]
    fn fetch_error_formats_status() {
        assert_eq!(FetchError::Status(503).to_string(), "HTTP status 503");
    }
}
