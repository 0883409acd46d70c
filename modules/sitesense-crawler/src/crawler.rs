//! The breadth-first crawl driver.
//!
//! One coordinating task owns all crawl state. Each iteration takes the
//! full batch at the current minimum depth, fans it out to the fetch
//! gateway concurrently, then fans back in: results are processed in
//! dispatch order, so duplicate suppression and enqueue decisions are
//! deterministic regardless of network completion order. The visited set
//! and the frontier are only ever touched between batch joins.

use thiserror::Error;
use tracing::{debug, info, warn};

use sitesense_core::config::CrawlConfig;
use sitesense_core::error::UrlRejection;
use sitesense_core::storage::PageStore;
use sitesense_core::types::{NewPage, UpsertOutcome};
use sitesense_core::url_policy::{canonicalize, UrlPolicy};

use crate::categorize::categorize;
use crate::fetcher::Fetcher;
use crate::frontier::Frontier;

/// Fatal, non-recoverable crawl conditions. Anything here aborts the
/// invocation; per-page fetch failures never do (they are counted and
/// skipped) until the failure threshold is crossed.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid start URL: {0}")]
    InvalidStartUrl(#[from] UrlRejection),

    #[error("storage unavailable: {0}")]
    Storage(anyhow::Error),

    #[error("aborted after {failed} failed pages (threshold {threshold})")]
    TooManyFailures { failed: usize, threshold: usize },
}

/// Final accounting for one crawl invocation.
#[derive(Debug, Default)]
pub struct CrawlReport {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_error: usize,
    /// URLs enqueued but never dequeued (budget cutoff).
    pub frontier_remaining: usize,
    pub depth_reached: usize,
}

impl std::fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Crawl Complete ===")?;
        writeln!(f, "Pages processed:    {}", self.processed)?;
        writeln!(f, "  created:          {}", self.created)?;
        writeln!(f, "  updated:          {}", self.updated)?;
        writeln!(f, "  unchanged:        {}", self.unchanged)?;
        writeln!(f, "Pages failed:       {}", self.skipped_error)?;
        writeln!(f, "Frontier remaining: {}", self.frontier_remaining)?;
        writeln!(f, "Depth reached:      {}", self.depth_reached)?;
        Ok(())
    }
}

pub struct Crawler<'a, F, S> {
    fetcher: &'a F,
    store: &'a S,
    config: CrawlConfig,
}

impl<'a, F: Fetcher, S: PageStore> Crawler<'a, F, S> {
    pub fn new(fetcher: &'a F, store: &'a S, config: CrawlConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    /// Crawl breadth-first from `start_url` until the frontier drains, the
    /// page budget is spent, or no candidate within `max_depth` remains.
    pub async fn run(&self, start_url: &str) -> Result<CrawlReport, CrawlError> {
        let start = canonicalize(start_url)?;
        let policy = UrlPolicy::for_origin(&start)?;
        let mut frontier = Frontier::seeded(&start);
        let mut report = CrawlReport::default();

        info!(
            url = %start,
            max_depth = self.config.max_depth,
            max_pages = self.config.max_pages,
            fetcher = self.fetcher.name(),
            "Starting crawl"
        );

        loop {
            if report.processed >= self.config.max_pages {
                info!(processed = report.processed, "Page budget reached");
                break;
            }

            let mut batch = frontier.take_level();
            if batch.is_empty() {
                break;
            }
            let depth = frontier.depth();

            // A level never dispatches past the remaining budget; the rest
            // stays enqueued-but-not-dequeued.
            let remaining = self.config.max_pages - report.processed;
            if batch.len() > remaining {
                let overflow = batch.split_off(remaining);
                frontier.restore_level(overflow);
            }

            info!(
                depth,
                batch = batch.len(),
                pending = frontier.pending(),
                "Dispatching level"
            );

            let results =
                futures::future::join_all(batch.iter().map(|url| self.fetcher.fetch(url))).await;

            for (url, result) in batch.iter().zip(results) {
                report.processed += 1;

                let page = match result {
                    Ok(page) => page,
                    Err(e) => {
                        report.skipped_error += 1;
                        warn!(url = %url, error = %e, "Fetch failed; skipping page");
                        if report.skipped_error > self.config.failure_threshold {
                            return Err(CrawlError::TooManyFailures {
                                failed: report.skipped_error,
                                threshold: self.config.failure_threshold,
                            });
                        }
                        continue;
                    }
                };

                let title = page.title.clone().unwrap_or_default();
                let mut record = NewPage::new(url.clone(), page.markdown.clone())
                    .with_metadata(page.metadata.clone());
                if !title.is_empty() {
                    record = record.with_title(title.clone());
                }
                if let Some(html) = page.html.clone() {
                    record = record.with_raw_html(html);
                }
                if let Some((category, confidence)) = categorize(url, &title, &page.markdown) {
                    record = record.with_category(category, confidence);
                }

                let outcome = self
                    .store
                    .upsert_page(&record)
                    .await
                    .map_err(CrawlError::Storage)?;
                match outcome {
                    UpsertOutcome::Created => report.created += 1,
                    UpsertOutcome::Updated => report.updated += 1,
                    UpsertOutcome::Unchanged => report.unchanged += 1,
                }
                info!(url = %url, depth, outcome = ?outcome, links = page.links.len(), "Stored page");

                if depth + 1 <= self.config.max_depth {
                    let mut added = 0;
                    for link in &page.links {
                        match policy.canonicalize_same_domain(link) {
                            Ok(canonical) => {
                                if frontier.enqueue_next(&canonical) {
                                    added += 1;
                                }
                            }
                            Err(reason) => {
                                debug!(link = %link, %reason, "Dropped link");
                            }
                        }
                    }
                    debug!(url = %url, added, "Enqueued discovered links");
                }
            }

            if frontier.pending() > 0 {
                tokio::time::sleep(self.config.crawl_delay).await;
            }
        }

        report.frontier_remaining = frontier.pending();
        report.depth_reached = frontier.depth();
        info!(
            processed = report.processed,
            failed = report.skipped_error,
            remaining = report.frontier_remaining,
            "Crawl complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    //! Boundary tests in MOCK → FUNCTION → OUTPUT form: set up the fetcher
    //! and store doubles, run one crawl, assert the report and stored state.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use sitesense_core::fingerprint::fingerprint;
    use sitesense_core::types::{EmbedTarget, EmbeddedChunk, IndexStats, SearchHit};

    use super::*;
    use crate::fetcher::{FetchError, FetchedPage};

    #[derive(Clone)]
    struct MockPage {
        markdown: String,
        links: Vec<String>,
    }

    struct MockFetcher {
        pages: HashMap<String, MockPage>,
        failures: HashMap<String, &'static str>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self {
                pages: HashMap::new(),
                failures: HashMap::new(),
                calls: Mutex::new(HashMap::new()),
            }
        }

        fn on_page(mut self, url: &str, markdown: &str, links: &[&str]) -> Self {
            self.pages.insert(
                url.to_string(),
                MockPage {
                    markdown: markdown.to_string(),
                    links: links.iter().map(|l| l.to_string()).collect(),
                },
            );
            self
        }

        fn failing(mut self, url: &str) -> Self {
            self.failures.insert(url.to_string(), "connection reset");
            self
        }

        fn fetch_count(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

            if let Some(msg) = self.failures.get(url) {
                return Err(FetchError::Transient(msg.to_string()));
            }
            let page = self
                .pages
                .get(url)
                .ok_or_else(|| FetchError::RejectedInput { status: 404 })?;
            Ok(FetchedPage {
                url: url.to_string(),
                markdown: page.markdown.clone(),
                html: None,
                title: None,
                links: page.links.clone(),
                metadata: serde_json::Value::Null,
            })
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        pages: Mutex<HashMap<String, String>>,
    }

    impl MemoryStore {
        fn page_count(&self) -> usize {
            self.pages.lock().unwrap().len()
        }

        fn has_page(&self, url: &str) -> bool {
            self.pages.lock().unwrap().contains_key(url)
        }
    }

    #[async_trait]
    impl PageStore for MemoryStore {
        async fn upsert_page(&self, page: &NewPage) -> anyhow::Result<UpsertOutcome> {
            let fp = fingerprint(&page.clean_text);
            let mut pages = self.pages.lock().unwrap();
            match pages.insert(page.url.clone(), fp.clone()) {
                None => Ok(UpsertOutcome::Created),
                Some(old) if old != fp => Ok(UpsertOutcome::Updated),
                Some(_) => Ok(UpsertOutcome::Unchanged),
            }
        }

        async fn targets_for_embedding(&self) -> anyhow::Result<Vec<EmbedTarget>> {
            unimplemented!()
        }

        async fn save_embeddings(
            &self,
            _url: &str,
            _page_vector: &[f32],
            _chunks: &[EmbeddedChunk],
        ) -> anyhow::Result<()> {
            unimplemented!()
        }

        async fn similarity_search(
            &self,
            _query_vector: &[f32],
            _top_k: i64,
        ) -> anyhow::Result<Vec<SearchHit>> {
            unimplemented!()
        }

        async fn stats(&self) -> anyhow::Result<IndexStats> {
            unimplemented!()
        }
    }

    struct FailingStore;

    #[async_trait]
    impl PageStore for FailingStore {
        async fn upsert_page(&self, _page: &NewPage) -> anyhow::Result<UpsertOutcome> {
            Err(anyhow::anyhow!("connection refused"))
        }

        async fn targets_for_embedding(&self) -> anyhow::Result<Vec<EmbedTarget>> {
            unimplemented!()
        }

        async fn save_embeddings(
            &self,
            _url: &str,
            _page_vector: &[f32],
            _chunks: &[EmbeddedChunk],
        ) -> anyhow::Result<()> {
            unimplemented!()
        }

        async fn similarity_search(
            &self,
            _query_vector: &[f32],
            _top_k: i64,
        ) -> anyhow::Result<Vec<SearchHit>> {
            unimplemented!()
        }

        async fn stats(&self) -> anyhow::Result<IndexStats> {
            unimplemented!()
        }
    }

    fn test_config() -> CrawlConfig {
        CrawlConfig::default().with_crawl_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn link_filtering_enqueues_only_valid_same_domain_urls() {
        let fetcher = MockFetcher::new()
            .on_page(
                "https://a.example",
                "# Home",
                &[
                    "https://a.example/p1",
                    "https://www.a.example/p2",
                    "javascript:void(0)",
                    "https://other.example/x",
                ],
            )
            .on_page("https://a.example/p1", "# P1", &[])
            .on_page("https://www.a.example/p2", "# P2", &[]);
        let store = MemoryStore::default();
        let config = test_config().with_max_depth(1).with_max_pages(10);

        let report = Crawler::new(&fetcher, &store, config)
            .run("https://a.example")
            .await
            .unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(report.created, 3);
        assert_eq!(report.skipped_error, 0);
        assert!(store.has_page("https://a.example/p1"));
        assert!(store.has_page("https://www.a.example/p2"));
        assert_eq!(fetcher.fetch_count("javascript:void(0)"), 0);
        assert_eq!(fetcher.fetch_count("https://other.example/x"), 0);
    }

    #[tokio::test]
    async fn max_depth_zero_never_follows_links() {
        let fetcher = MockFetcher::new().on_page(
            "https://a.example",
            "# Home",
            &["https://a.example/p1"],
        );
        let store = MemoryStore::default();
        let config = test_config().with_max_depth(0);

        let report = Crawler::new(&fetcher, &store, config)
            .run("https://a.example")
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(store.page_count(), 1);
        assert_eq!(fetcher.fetch_count("https://a.example/p1"), 0);
    }

    #[tokio::test]
    async fn page_budget_truncates_a_level() {
        let links: Vec<String> = (0..8).map(|i| format!("https://a.example/p{i}")).collect();
        let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
        let mut fetcher = MockFetcher::new().on_page("https://a.example", "# Home", &link_refs);
        for link in &links {
            fetcher = fetcher.on_page(link, "# Page", &[]);
        }
        let store = MemoryStore::default();
        let config = test_config().with_max_depth(2).with_max_pages(4);

        let report = Crawler::new(&fetcher, &store, config)
            .run("https://a.example")
            .await
            .unwrap();

        assert_eq!(report.processed, 4);
        assert_eq!(report.frontier_remaining, 5, "8 enqueued, 3 dispatched");
        assert_eq!(store.page_count(), 4);
    }

    #[tokio::test]
    async fn duplicate_discovery_fetches_once() {
        // p1 and p2 both link to the same novel URL; it must be fetched once.
        let fetcher = MockFetcher::new()
            .on_page(
                "https://a.example",
                "# Home",
                &["https://a.example/p1", "https://a.example/p2"],
            )
            .on_page("https://a.example/p1", "# P1", &["https://a.example/shared"])
            .on_page("https://a.example/p2", "# P2", &["https://a.example/shared"])
            .on_page("https://a.example/shared", "# Shared", &[]);
        let store = MemoryStore::default();
        let config = test_config().with_max_depth(2);

        let report = Crawler::new(&fetcher, &store, config)
            .run("https://a.example")
            .await
            .unwrap();

        assert_eq!(report.processed, 4);
        assert_eq!(fetcher.fetch_count("https://a.example/shared"), 1);
    }

    #[tokio::test]
    async fn a_failed_fetch_is_skipped_not_fatal() {
        let fetcher = MockFetcher::new()
            .on_page(
                "https://a.example",
                "# Home",
                &["https://a.example/bad", "https://a.example/good"],
            )
            .failing("https://a.example/bad")
            .on_page("https://a.example/good", "# Good", &[]);
        let store = MemoryStore::default();
        let config = test_config().with_max_depth(1);

        let report = Crawler::new(&fetcher, &store, config)
            .run("https://a.example")
            .await
            .unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(report.skipped_error, 1);
        assert!(store.has_page("https://a.example/good"));
        assert!(!store.has_page("https://a.example/bad"));
    }

    #[tokio::test]
    async fn exceeding_the_failure_threshold_aborts() {
        let fetcher = MockFetcher::new()
            .on_page(
                "https://a.example",
                "# Home",
                &["https://a.example/b1", "https://a.example/b2"],
            )
            .failing("https://a.example/b1")
            .failing("https://a.example/b2");
        let store = MemoryStore::default();
        let config = test_config().with_max_depth(1).with_failure_threshold(1);

        let err = Crawler::new(&fetcher, &store, config)
            .run("https://a.example")
            .await
            .unwrap_err();

        assert!(matches!(err, CrawlError::TooManyFailures { failed: 2, .. }));
    }

    #[tokio::test]
    async fn storage_failure_aborts_the_crawl() {
        let fetcher = MockFetcher::new().on_page("https://a.example", "# Home", &[]);
        let store = FailingStore;

        let err = Crawler::new(&fetcher, &store, test_config())
            .run("https://a.example")
            .await
            .unwrap_err();

        assert!(matches!(err, CrawlError::Storage(_)));
    }

    #[tokio::test]
    async fn recrawl_of_identical_content_reports_unchanged() {
        let fetcher = MockFetcher::new().on_page("https://a.example", "# Home", &[]);
        let store = MemoryStore::default();

        let first = Crawler::new(&fetcher, &store, test_config())
            .run("https://a.example")
            .await
            .unwrap();
        assert_eq!(first.created, 1);

        let second = Crawler::new(&fetcher, &store, test_config())
            .run("https://a.example")
            .await
            .unwrap();
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.created, 0);
    }

    #[tokio::test]
    async fn invalid_start_url_is_rejected_up_front() {
        let fetcher = MockFetcher::new();
        let store = MemoryStore::default();

        let err = Crawler::new(&fetcher, &store, test_config())
            .run("javascript:void(0)")
            .await
            .unwrap_err();

        assert!(matches!(err, CrawlError::InvalidStartUrl(_)));
        assert_eq!(store.page_count(), 0);
    }

    #[tokio::test]
    async fn visited_set_is_bounded_by_budget_plus_pending() {
        let links: Vec<String> = (0..20).map(|i| format!("https://a.example/p{i}")).collect();
        let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
        let mut fetcher = MockFetcher::new().on_page("https://a.example", "# Home", &link_refs);
        for link in &links {
            fetcher = fetcher.on_page(link, "# Page", &[]);
        }
        let store = MemoryStore::default();
        let config = test_config().with_max_depth(1).with_max_pages(5);

        let report = Crawler::new(&fetcher, &store, config)
            .run("https://a.example")
            .await
            .unwrap();

        assert_eq!(report.processed, 5);
        // 21 URLs ever visited = 5 processed + 16 still enqueued
        assert_eq!(report.frontier_remaining, 16);
    }
}
