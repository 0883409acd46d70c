//! The embed phase: vectorize every page whose content changed since the
//! last pass.
//!
//! Embedding cost scales with changed content, not crawl volume: the
//! target query only returns pages that were never embedded or whose
//! fingerprint moved after the last embed. A failing oracle call skips
//! that one page; a failing database write aborts the pass.

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn};

use sitesense_core::chunk::chunk_text;
use sitesense_core::config::ModelConfig;
use sitesense_core::storage::PageStore;
use sitesense_core::types::{EmbedTarget, EmbeddedChunk};
use sitesense_core::TextEmbedder;

#[derive(Debug, Default)]
pub struct EmbedReport {
    pub embedded: usize,
    pub skipped_error: usize,
}

impl std::fmt::Display for EmbedReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Embed Pass Complete ===")?;
        writeln!(f, "Pages embedded: {}", self.embedded)?;
        writeln!(f, "Pages failed:   {}", self.skipped_error)?;
        Ok(())
    }
}

enum PageFailure {
    /// Oracle-side failure; isolated to this page.
    Oracle(anyhow::Error),
    /// Persistence failure; fatal to the whole pass.
    Storage(anyhow::Error),
}

/// Run one embed pass over all pending targets.
pub async fn run_embed<S, E>(store: &S, embedder: &E, model: &ModelConfig) -> Result<EmbedReport>
where
    S: PageStore + ?Sized,
    E: TextEmbedder + ?Sized,
{
    let targets = store
        .targets_for_embedding()
        .await
        .context("Failed to query embedding targets")?;

    if targets.is_empty() {
        info!("Nothing new to embed");
        return Ok(EmbedReport::default());
    }

    info!(count = targets.len(), "Pages to embed");
    let mut report = EmbedReport::default();

    for target in &targets {
        if target.clean_text.trim().is_empty() {
            debug!(url = %target.url, "Skipping page with empty content");
            continue;
        }

        match embed_page(store, embedder, model, target).await {
            Ok(chunk_count) => {
                report.embedded += 1;
                info!(url = %target.url, chunks = chunk_count, "Embedded page");
            }
            Err(PageFailure::Oracle(e)) => {
                report.skipped_error += 1;
                warn!(url = %target.url, error = %e, "Embedding failed; skipping page");
            }
            Err(PageFailure::Storage(e)) => {
                return Err(e.context(format!("Failed to persist embeddings for {}", target.url)));
            }
        }
    }

    Ok(report)
}

/// Embed one page: a page-level vector over the full text, then one vector
/// per chunk, persisted in a single transaction. Returns the chunk count.
async fn embed_page<S, E>(
    store: &S,
    embedder: &E,
    model: &ModelConfig,
    target: &EmbedTarget,
) -> std::result::Result<usize, PageFailure>
where
    S: PageStore + ?Sized,
    E: TextEmbedder + ?Sized,
{
    let page_vector = embedder
        .embed(&target.clean_text)
        .await
        .map_err(PageFailure::Oracle)?;

    let chunks = chunk_text(&target.clean_text, model.chunk_tokens);
    let vectors = embedder
        .embed_batch(chunks.clone())
        .await
        .map_err(PageFailure::Oracle)?;
    if vectors.len() != chunks.len() {
        return Err(PageFailure::Oracle(anyhow!(
            "Embedding count mismatch: {} chunks, {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }

    let rows: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(idx, (text, vector))| EmbeddedChunk {
            chunk_index: idx as i32,
            text,
            vector,
        })
        .collect();

    store
        .save_embeddings(&target.url, &page_vector, &rows)
        .await
        .map_err(PageFailure::Storage)?;

    Ok(rows.len())
}
