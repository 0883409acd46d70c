//! The fetch gateway: typed access to the scrape oracle.
//!
//! All page retrieval goes through the [`Fetcher`] trait. The Firecrawl
//! implementation enforces a global concurrency cap and a minimum spacing
//! between outgoing requests, and retries transient failures with
//! exponential backoff. It is stateless apart from that accounting.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

/// A page as reported by the scrape oracle. The oracle extracts the clean
/// markdown, the raw markup, and the outbound links; the gateway never
/// parses markup itself.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub markdown: String,
    pub html: Option<String>,
    pub title: Option<String>,
    pub links: Vec<String>,
    pub metadata: serde_json::Value,
}

/// Typed fetch failures. Retry eligibility is a property of the error:
/// rejected input is the caller's fault and retrying would only waste a
/// request slot.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (connect, reset, DNS)
    #[error("transient fetch error: {0}")]
    Transient(String),

    /// The oracle rejected the request as malformed (4xx)
    #[error("upstream rejected input (status {status})")]
    RejectedInput { status: u16 },

    /// The oracle itself failed (5xx)
    #[error("upstream server error (status {status})")]
    Upstream { status: u16 },

    /// The request timed out
    #[error("fetch timed out")]
    Timeout,
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) | Self::Timeout => true,
            Self::Upstream { .. } => true,
            Self::RejectedInput { .. } => false,
        }
    }
}

/// Capability interface for page retrieval, so the crawl driver can run
/// against a test double.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
    fn name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ScrapeRequest {
    url: String,
    formats: Vec<String>,
    #[serde(rename = "onlyMainContent")]
    only_main_content: bool,
    #[serde(rename = "excludeTags")]
    exclude_tags: Vec<String>,
    #[serde(rename = "blockAds")]
    block_ads: bool,
    timeout: u32,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    html: Option<String>,
    #[serde(default)]
    links: Vec<String>,
    metadata: Option<serde_json::Value>,
}

/// Fetcher backed by a Firecrawl-compatible `/v1/scrape` endpoint.
pub struct FirecrawlFetcher {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    semaphore: Semaphore,
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
    max_retries: u32,
}

impl FirecrawlFetcher {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            semaphore: Semaphore::new(8),
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(200),
            max_retries: 3,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_concurrency(mut self, permits: usize) -> Self {
        self.semaphore = Semaphore::new(permits);
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Enforce the minimum spacing between outgoing requests. The lock is
    /// held across the sleep so concurrent fetches leave the gateway at
    /// most once per interval.
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn scrape_once(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let request = ScrapeRequest {
            url: url.to_string(),
            formats: vec![
                "markdown".to_string(),
                "html".to_string(),
                "links".to_string(),
            ],
            only_main_content: false,
            exclude_tags: vec!["img".to_string(), "video".to_string()],
            block_ads: true,
            timeout: 30_000,
        };

        let mut builder = self
            .http
            .post(format!("{}/v1/scrape", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Transient(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_client_error() {
            return Err(FetchError::RejectedInput {
                status: status.as_u16(),
            });
        }
        if status.is_server_error() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
            });
        }

        let parsed: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        if !parsed.success {
            let msg = parsed.error.unwrap_or_else(|| "unknown error".to_string());
            return Err(FetchError::Transient(format!("scrape failed: {msg}")));
        }

        let data = parsed
            .data
            .ok_or_else(|| FetchError::Transient("scrape returned no data".to_string()))?;

        let metadata = data.metadata.unwrap_or(serde_json::Value::Null);
        let title = metadata
            .get("title")
            .and_then(|t| t.as_str())
            .map(String::from);

        Ok(FetchedPage {
            url: url.to_string(),
            markdown: data.markdown.unwrap_or_default(),
            html: data.html,
            title,
            links: data.links,
            metadata,
        })
    }
}

#[async_trait]
impl Fetcher for FirecrawlFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::Transient("fetch gateway closed".to_string()))?;

        let mut attempt = 0;
        loop {
            self.pace().await;

            match self.scrape_once(url).await {
                Ok(page) => {
                    debug!(url, bytes = page.markdown.len(), "Scraped successfully");
                    return Ok(page);
                }
                Err(e) if e.is_retryable() && attempt + 1 < self.max_retries => {
                    let backoff = Duration::from_secs(1 << attempt);
                    warn!(
                        url,
                        attempt = attempt + 1,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "Fetch failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_timeout_are_retryable() {
        assert!(FetchError::Transient("reset".into()).is_retryable());
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Upstream { status: 502 }.is_retryable());
    }

    #[test]
    fn rejected_input_is_never_retryable() {
        assert!(!FetchError::RejectedInput { status: 400 }.is_retryable());
        assert!(!FetchError::RejectedInput { status: 422 }.is_retryable());
    }

    #[test]
    fn scrape_request_uses_oracle_field_names() {
        let request = ScrapeRequest {
            url: "https://example.com".to_string(),
            formats: vec!["markdown".to_string()],
            only_main_content: false,
            exclude_tags: vec![],
            block_ads: true,
            timeout: 30_000,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["onlyMainContent"], false);
        assert_eq!(value["blockAds"], true);
        assert_eq!(value["formats"][0], "markdown");
    }

    #[test]
    fn scrape_response_parses_oracle_shape() {
        let body = r#"{
            "success": true,
            "data": {
                "markdown": "# Hi",
                "html": "<h1>Hi</h1>",
                "links": ["https://example.com/about"],
                "metadata": {"title": "Hi", "sourceURL": "https://example.com"}
            }
        }"#;
        let parsed: ScrapeResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.success);
        let data = parsed.data.unwrap();
        assert_eq!(data.markdown.as_deref(), Some("# Hi"));
        assert_eq!(data.links.len(), 1);
    }
}
