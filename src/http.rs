//! Shared HTTP plumbing for the upstream provider clients.

use std::time::Duration;

use reqwest::Client;

/// Timeout applied to every outbound provider request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a configured HTTP client for a provider.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// Extension trait for Response that logs response bodies.
#[async_trait::async_trait]
pub trait ResponseExt {
    /// Get response text and log it. Consumes the response.
    async fn text_logged(self) -> Result<String, reqwest::Error>;

    /// Parse response as JSON and log it. Consumes the response.
    async fn json_logged<T, E>(self) -> Result<T, E>
    where
        T: serde::de::DeserializeOwned,
        E: From<reqwest::Error> + From<serde_json::Error>;
}

#[async_trait::async_trait]
impl ResponseExt for reqwest::Response {
    async fn text_logged(self) -> Result<String, reqwest::Error> {
        let text = self.text().await?;
        tracing::debug!("provider response ({} bytes):\n{}", text.len(), text);
        Ok(text)
    }

    async fn json_logged<T, E>(self) -> Result<T, E>
    where
        T: serde::de::DeserializeOwned,
        E: From<reqwest::Error> + From<serde_json::Error>,
    {
        let bytes = self.bytes().await?;

        if let Ok(text) = std::str::from_utf8(&bytes) {
            tracing::debug!("provider response ({} bytes):\n{}", text.len(), text);
        }

        serde_json::from_slice(&bytes).map_err(E::from)
    }
}
