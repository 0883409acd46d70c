//! Configuration: environment-driven endpoints/secrets plus tunable policy.
//!
//! `AppConfig` carries only env-specific values (connection strings,
//! endpoints, keys). Crawl pacing, model parameters, and search knobs are
//! plain policy structs with deployment defaults, overridable per
//! invocation.

use std::time::Duration;

use anyhow::Result;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,

    // Scrape oracle (Firecrawl-compatible)
    pub firecrawl_url: String,
    pub firecrawl_api_key: Option<String>,

    // Embedding oracle (OpenAI-compatible /embeddings)
    pub embeddings_url: String,
    pub embeddings_api_key: Option<String>,
    pub embedding_model: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")?,
            firecrawl_url: std::env::var("FIRECRAWL_URL")
                .unwrap_or_else(|_| "http://localhost:3002".to_string()),
            firecrawl_api_key: std::env::var("FIRECRAWL_API_KEY").ok(),
            embeddings_url: std::env::var("EMBEDDINGS_URL")
                .unwrap_or_else(|_| "http://localhost:8081/v1".to_string()),
            embeddings_api_key: std::env::var("EMBEDDINGS_API_KEY").ok(),
            embedding_model: std::env::var("EMBEDDING_MODEL").ok(),
        };

        config.log_redacted();
        Ok(config)
    }

    fn log_redacted(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let n = v.len().min(5);
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  FIRECRAWL_URL: {}", self.firecrawl_url);
        tracing::info!(
            "  FIRECRAWL_API_KEY: {}",
            preview_opt(&self.firecrawl_api_key)
        );
        tracing::info!("  EMBEDDINGS_URL: {}", self.embeddings_url);
        tracing::info!(
            "  EMBEDDINGS_API_KEY: {}",
            preview_opt(&self.embeddings_api_key)
        );
    }
}

/// Tunable crawl policy. All of these are policy knobs, not design
/// constants: retries, pacing, and the failure threshold vary by target
/// site and upstream capacity.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Deepest level to follow links from the start URL.
    pub max_depth: usize,
    /// Global page budget for one crawl invocation.
    pub max_pages: usize,
    /// Pause between breadth-first levels.
    pub crawl_delay: Duration,
    /// Concurrent in-flight fetches at the gateway.
    pub concurrency: usize,
    /// Minimum spacing between requests leaving the gateway.
    pub min_request_interval: Duration,
    /// Attempts per URL for retryable fetch errors.
    pub max_retries: u32,
    /// Abort the crawl once this many pages have failed.
    pub failure_threshold: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 1_000,
            crawl_delay: Duration::from_millis(200),
            concurrency: 8,
            min_request_interval: Duration::from_millis(200),
            max_retries: 3,
            failure_threshold: 25,
        }
    }
}

impl CrawlConfig {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_crawl_delay(mut self, delay: Duration) -> Self {
        self.crawl_delay = delay;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }
}

/// Embedding model parameters. The dimension is fixed by the served model;
/// vectors of any other width are rejected at the client boundary.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub name: String,
    pub chunk_tokens: usize,
    pub dimension: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "BAAI/bge-large-en-v1.5".to_string(),
            chunk_tokens: 500,
            dimension: 1024,
        }
    }
}

impl ModelConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Search-time knobs.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub top_k: i64,
    /// HNSW ef_search parameter applied per query.
    pub ef_search: i32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            ef_search: 200,
        }
    }
}

impl SearchConfig {
    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = top_k;
        self
    }
}
