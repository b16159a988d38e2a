use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::errors::{ImportError, ImportResult};
use crate::utils::url::UrlUtils;

/// HTTP fetcher seam used by the orchestrator and the directory provider.
///
/// Keeping fetching behind a trait lets tests inject deterministic
/// responses without a network.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch URL and return the response body as text.
    async fn fetch_text(&self, url: &str) -> ImportResult<String>;

    /// Fetch URL and return the response body as parsed JSON.
    async fn fetch_json_value(&self, url: &str) -> ImportResult<Value>;
}

/// Default `ContentFetcher` backed by reqwest.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new fetcher with the default connection timeout.
    pub fn new() -> Self {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    /// Create a new fetcher with only a connection timeout, leaving the
    /// transfer itself unbounded so large playlists can finish.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    async fn fetch_bytes(&self, url: &str) -> ImportResult<Vec<u8>> {
        debug!(
            "Fetching content from: {}",
            UrlUtils::obfuscate_credentials(url)
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            ImportError::manifest_fetch(url, UrlUtils::obfuscate_credentials(&e.to_string()))
        })?;

        if !response.status().is_success() {
            return Err(ImportError::HttpStatus {
                status: response.status().as_u16(),
                url: UrlUtils::obfuscate_credentials(url),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImportError::manifest_fetch(url, format!("failed to read body: {e}")))?;

        debug!("Fetched {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> ImportResult<String> {
        let bytes = self.fetch_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn fetch_json_value(&self, url: &str) -> ImportResult<Value> {
        let bytes = self.fetch_bytes(url).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ImportError::manifest_fetch(url, format!("failed to parse JSON: {e}")))
    }
}

/// Deserialize a fetched JSON value into a concrete type.
pub fn from_json_value<T: DeserializeOwned>(value: Value, url: &str) -> ImportResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ImportError::manifest_fetch(url, format!("unexpected JSON shape: {e}")))
}
