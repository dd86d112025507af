pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

/// Body of a `/content` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<WaitForSelector>,
    pub goto_options: GotoOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitForSelector {
    pub selector: String,
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GotoOptions {
    pub wait_until: String,
    pub timeout: u64,
}

impl ContentRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            wait_for_selector: None,
            goto_options: GotoOptions {
                wait_until: "networkidle2".to_string(),
                timeout: 30_000,
            },
        }
    }

    /// Block until `selector` appears in the DOM (or `timeout_ms` elapses).
    pub fn wait_for(mut self, selector: &str, timeout_ms: u64) -> Self {
        self.wait_for_selector = Some(WaitForSelector {
            selector: selector.to_string(),
            timeout: timeout_ms,
        });
        self
    }
}

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrowserlessError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    /// Fetch fully-rendered HTML for a URL.
    pub async fn content(&self, url: &str) -> Result<String> {
        self.render(&ContentRequest::new(url)).await
    }

    /// Fetch fully-rendered HTML using an explicit request body.
    pub async fn render(&self, request: &ContentRequest) -> Result<String> {
        let endpoint = format!("{}/content", self.base_url);

        let mut builder = self.client.post(&endpoint).json(request);
        if let Some(ref token) = self.token {
            builder = builder.query(&[("token", token.as_str())]);
        }

        debug!(url = %request.url, "Requesting rendered content from Browserless");
        let resp = builder.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_browserless_field_names() {
        let req = ContentRequest::new("https://example.org/perle").wait_for(".perla", 5_000);
        let body = serde_json::to_value(&req).unwrap();

        assert_eq!(body["url"], "https://example.org/perle");
        assert_eq!(body["waitForSelector"]["selector"], ".perla");
        assert_eq!(body["gotoOptions"]["waitUntil"], "networkidle2");
    }

    #[test]
    fn wait_for_selector_omitted_by_default() {
        let body = serde_json::to_value(ContentRequest::new("https://example.org")).unwrap();
        assert!(body.get("waitForSelector").is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = BrowserlessClient::new("http://localhost:3000/", None).unwrap();
        assert_eq!(client.base_url, "http://localhost:3000");
    }
}
