//! The storage capability seam.
//!
//! The crawler and the embed/search phases depend on this trait rather than
//! on a concrete database, so test doubles substitute without inheritance.
//! The Postgres implementation lives in `sitesense-index`.

use async_trait::async_trait;

use crate::types::{EmbedTarget, EmbeddedChunk, IndexStats, NewPage, SearchHit, UpsertOutcome};

/// Persistence operations over page and chunk records.
///
/// Upserts are idempotent by canonical URL; the crawl phase never touches
/// `summary_vec`/`embedded_at`, which belong to the embed phase alone.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Create or refresh a page record. Returns what actually happened so
    /// the caller can account changed vs. unchanged pages.
    async fn upsert_page(&self, page: &NewPage) -> anyhow::Result<UpsertOutcome>;

    /// Pages whose content was never embedded, or changed since the last
    /// embed pass.
    async fn targets_for_embedding(&self) -> anyhow::Result<Vec<EmbedTarget>>;

    /// Atomically store the page-level vector and replace the page's chunk
    /// rows. Marks the page embedded.
    async fn save_embeddings(
        &self,
        url: &str,
        page_vector: &[f32],
        chunks: &[EmbeddedChunk],
    ) -> anyhow::Result<()>;

    /// Approximate nearest-neighbor lookup over chunk vectors. Scores are
    /// normalized similarities in [0, 1], descending, ties broken by url.
    async fn similarity_search(
        &self,
        query_vector: &[f32],
        top_k: i64,
    ) -> anyhow::Result<Vec<SearchHit>>;

    /// Index-wide counts.
    async fn stats(&self) -> anyhow::Result<IndexStats>;
}
