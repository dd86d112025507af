use std::time::Duration;

use async_trait::async_trait;
use browserless_client::{BrowserlessClient, ContentRequest};
use tracing::info;

use crate::error::{Result, SourceError};

const USER_AGENT: &str = "PerleBot/1.0";

/// Turns a URL into text: raw HTTP for static pages and CSV exports,
/// Browserless for pages that build their DOM with JavaScript.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;

    fn name(&self) -> &str;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SourceError::Config(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).map_err(|e| SourceError::Config(format!("invalid URL {url}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SourceError::Config(format!(
                "only http/https URLs are allowed, got: {}",
                parsed.scheme()
            )));
        }

        info!(url, fetcher = "http", "Fetching source");
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        info!(url, fetcher = "http", bytes = body.len(), "Fetched source");
        Ok(body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

pub struct BrowserlessFetcher {
    client: BrowserlessClient,
    wait_for: Option<String>,
}

impl BrowserlessFetcher {
    pub fn new(base_url: &str, token: Option<&str>, wait_for: Option<String>) -> Result<Self> {
        info!(base_url, "Using Browserless for page rendering");
        Ok(Self {
            client: BrowserlessClient::new(base_url, token)?,
            wait_for,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserlessFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let mut request = ContentRequest::new(url);
        if let Some(ref selector) = self.wait_for {
            request = request.wait_for(selector, 15_000);
        }

        info!(url, fetcher = "browserless", "Rendering source page");
        let html = self.client.render(&request).await?;
        info!(url, fetcher = "browserless", bytes = html.len(), "Rendered source page");
        Ok(html)
    }

    fn name(&self) -> &str {
        "browserless"
    }
}
