//! Postgres persistence for pages and chunk vectors.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::debug;

use sitesense_core::fingerprint::{fingerprint, has_changed};
use sitesense_core::storage::PageStore;
use sitesense_core::types::{
    CategoryCount, EmbedTarget, EmbeddedChunk, IndexStats, NewPage, SearchHit, UpsertOutcome,
};

/// pgvector-backed implementation of the [`PageStore`] capability.
pub struct PgPageStore {
    pool: PgPool,
    ef_search: i32,
}

impl PgPageStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            ef_search: 200,
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;
        Ok(Self::new(pool))
    }

    /// HNSW ef_search applied per similarity query.
    pub fn with_ef_search(mut self, ef_search: i32) -> Self {
        self.ef_search = ef_search;
        self
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PageStore for PgPageStore {
    /// Idempotent by url. Only a real content change rewrites the record
    /// and bumps `checksum_changed_at`; the embed-phase columns
    /// (`summary_vec`, `embedded_at`) are never touched from here.
    async fn upsert_page(&self, page: &NewPage) -> Result<UpsertOutcome> {
        let checksum = fingerprint(&page.clean_text);
        let category = page.category.map(|c| c.as_str());

        let existing = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT content_checksum FROM pages WHERE url = $1",
        )
        .bind(&page.url)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO pages
                        (url, title, clean_text, raw_html, content_checksum,
                         checksum_changed_at, metadata, category,
                         category_confidence, last_seen)
                    VALUES ($1, $2, $3, $4, $5, NOW(), $6, $7, $8, NOW())
                    "#,
                )
                .bind(&page.url)
                .bind(&page.title)
                .bind(&page.clean_text)
                .bind(&page.raw_html)
                .bind(&checksum)
                .bind(&page.metadata)
                .bind(category)
                .bind(page.category_confidence)
                .execute(&self.pool)
                .await?;
                Ok(UpsertOutcome::Created)
            }
            Some((old_checksum,)) if has_changed(old_checksum.as_deref(), &checksum) => {
                sqlx::query(
                    r#"
                    UPDATE pages SET
                        title = $2, clean_text = $3, raw_html = $4,
                        content_checksum = $5, checksum_changed_at = NOW(),
                        metadata = $6, category = $7, category_confidence = $8,
                        last_seen = NOW()
                    WHERE url = $1
                    "#,
                )
                .bind(&page.url)
                .bind(&page.title)
                .bind(&page.clean_text)
                .bind(&page.raw_html)
                .bind(&checksum)
                .bind(&page.metadata)
                .bind(category)
                .bind(page.category_confidence)
                .execute(&self.pool)
                .await?;
                Ok(UpsertOutcome::Updated)
            }
            Some(_) => {
                sqlx::query("UPDATE pages SET last_seen = NOW() WHERE url = $1")
                    .bind(&page.url)
                    .execute(&self.pool)
                    .await?;
                Ok(UpsertOutcome::Unchanged)
            }
        }
    }

    async fn targets_for_embedding(&self) -> Result<Vec<EmbedTarget>> {
        let rows = sqlx::query_as::<
            _,
            (
                String,
                String,
                Option<DateTime<Utc>>,
                Option<DateTime<Utc>>,
            ),
        >(
            r#"
            SELECT url, clean_text, checksum_changed_at, embedded_at
            FROM pages
            WHERE clean_text IS NOT NULL
              AND (embedded_at IS NULL OR checksum_changed_at > embedded_at)
            ORDER BY url
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(url, clean_text, checksum_changed_at, embedded_at)| EmbedTarget {
                    url,
                    clean_text,
                    checksum_changed_at,
                    embedded_at,
                },
            )
            .collect())
    }

    /// One transaction per page: the summary vector, the embed timestamp,
    /// and the full chunk replacement land together or not at all.
    async fn save_embeddings(
        &self,
        url: &str,
        page_vector: &[f32],
        chunks: &[EmbeddedChunk],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE pages SET summary_vec = $2, embedded_at = NOW() WHERE url = $1")
            .bind(url)
            .bind(Vector::from(page_vector.to_vec()))
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM chunks WHERE page_url = $1")
            .bind(url)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (page_url, chunk_index, text, vec) VALUES ($1, $2, $3, $4)",
            )
            .bind(url)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(Vector::from(chunk.vector.clone()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(url, chunks = chunks.len(), "Saved embeddings");
        Ok(())
    }

    /// Cosine similarity over chunk vectors. Score is `1 - distance`, so
    /// 1.0 is an exact match; ordering is score-descending with url as the
    /// deterministic tie-break.
    async fn similarity_search(&self, query_vector: &[f32], top_k: i64) -> Result<Vec<SearchHit>> {
        let mut tx = self.pool.begin().await?;

        // ef_search is a validated integer knob; SET LOCAL takes no binds.
        sqlx::query(&format!("SET LOCAL hnsw.ef_search = {}", self.ef_search))
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query_as::<_, (String, String, f64)>(
            r#"
            SELECT c.page_url, c.text, 1 - (c.vec <=> $1) AS score
            FROM chunks c
            ORDER BY c.vec <=> $1, c.page_url
            LIMIT $2
            "#,
        )
        .bind(Vector::from(query_vector.to_vec()))
        .bind(top_k)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|(url, snippet, score)| SearchHit {
                url,
                snippet,
                score,
            })
            .collect())
    }

    async fn stats(&self) -> Result<IndexStats> {
        let (total_pages,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pages")
            .fetch_one(&self.pool)
            .await?;
        let (embedded_pages,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM pages WHERE embedded_at IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;
        let (total_chunks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;

        let categories = sqlx::query_as::<_, (String, i64, Option<f64>)>(
            r#"
            SELECT category, COUNT(*), AVG(category_confidence)::float8
            FROM pages
            WHERE category IS NOT NULL
            GROUP BY category
            ORDER BY COUNT(*) DESC, category
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(category, pages, avg_confidence)| CategoryCount {
            category,
            pages,
            avg_confidence,
        })
        .collect();

        Ok(IndexStats {
            total_pages,
            embedded_pages,
            total_chunks,
            categories,
        })
    }
}
