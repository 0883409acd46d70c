//! Semantic search: encode the query, run the ANN lookup, format results.

use anyhow::{Context, Result};

use sitesense_core::storage::PageStore;
use sitesense_core::types::SearchHit;
use sitesense_core::TextEmbedder;

/// Embed a free-text query and return the top-k most similar chunks.
pub async fn run_search<S, E>(
    store: &S,
    embedder: &E,
    query: &str,
    top_k: i64,
) -> Result<Vec<SearchHit>>
where
    S: PageStore + ?Sized,
    E: TextEmbedder + ?Sized,
{
    let query_vector = embedder
        .embed(query)
        .await
        .context("Failed to embed query")?;
    store.similarity_search(&query_vector, top_k).await
}

/// Ranked display form: `#rank  score=0.xxx  url` plus a 300-char snippet.
pub fn format_results(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results.".to_string();
    }

    let mut out = String::new();
    for (rank, hit) in hits.iter().enumerate() {
        let snippet: String = hit.snippet.chars().take(300).collect();
        out.push_str(&format!(
            "\n#{}  score={:.3}  {}\n{}…\n",
            rank + 1,
            hit.score,
            hit.url,
            snippet.replace('\n', " ").trim()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use sitesense_core::types::{EmbedTarget, EmbeddedChunk, IndexStats, NewPage, UpsertOutcome};

    use super::*;

    /// Store double: brute-force dot-product ranking over stored unit
    /// vectors, ties broken by url, truncated to top_k.
    struct VectorStore {
        chunks: Vec<(String, String, Vec<f32>)>,
    }

    #[async_trait]
    impl PageStore for VectorStore {
        async fn upsert_page(&self, _page: &NewPage) -> Result<UpsertOutcome> {
            unimplemented!()
        }

        async fn targets_for_embedding(&self) -> Result<Vec<EmbedTarget>> {
            unimplemented!()
        }

        async fn save_embeddings(
            &self,
            _url: &str,
            _page_vector: &[f32],
            _chunks: &[EmbeddedChunk],
        ) -> Result<()> {
            unimplemented!()
        }

        async fn similarity_search(
            &self,
            query_vector: &[f32],
            top_k: i64,
        ) -> Result<Vec<SearchHit>> {
            let mut hits: Vec<SearchHit> = self
                .chunks
                .iter()
                .map(|(url, text, vec)| SearchHit {
                    url: url.clone(),
                    snippet: text.clone(),
                    score: vec
                        .iter()
                        .zip(query_vector)
                        .map(|(a, b)| (a * b) as f64)
                        .sum(),
                })
                .collect();
            hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap()
                    .then_with(|| a.url.cmp(&b.url))
            });
            hits.truncate(top_k as usize);
            Ok(hits)
        }

        async fn stats(&self) -> Result<IndexStats> {
            unimplemented!()
        }
    }

    /// Embedder double: each known text maps to a fixed unit basis vector.
    struct BasisEmbedder;

    #[async_trait]
    impl TextEmbedder for BasisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                "rust tutorials" => vec![1.0, 0.0, 0.0],
                "hiring engineers" => vec![0.0, 1.0, 0.0],
                _ => vec![0.0, 0.0, 1.0],
            })
        }

        async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in &texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }
    }

    #[tokio::test]
    async fn exact_match_scores_one_at_rank_zero() {
        let store = VectorStore {
            chunks: vec![
                (
                    "https://a.example/careers".to_string(),
                    "hiring engineers".to_string(),
                    vec![0.0, 1.0, 0.0],
                ),
                (
                    "https://a.example/blog".to_string(),
                    "rust tutorials".to_string(),
                    vec![1.0, 0.0, 0.0],
                ),
            ],
        };

        let hits = run_search(&store, &BasisEmbedder, "rust tutorials", 5)
            .await
            .unwrap();

        assert_eq!(hits[0].url, "https://a.example/blog");
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert!(hits[1].score < hits[0].score);
    }

    #[tokio::test]
    async fn top_k_bounds_the_result_count() {
        let store = VectorStore {
            chunks: vec![
                (
                    "https://a.example/p1".to_string(),
                    "one".to_string(),
                    vec![0.0, 0.0, 1.0],
                ),
                (
                    "https://a.example/p2".to_string(),
                    "two".to_string(),
                    vec![0.0, 0.0, 1.0],
                ),
            ],
        };

        let hits = run_search(&store, &BasisEmbedder, "anything else", 1)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        // identical scores fall back to url order
        assert_eq!(hits[0].url, "https://a.example/p1");
    }

    fn hit(url: &str, snippet: &str, score: f64) -> SearchHit {
        SearchHit {
            url: url.to_string(),
            snippet: snippet.to_string(),
            score,
        }
    }

    #[test]
    fn empty_results_say_so() {
        assert_eq!(format_results(&[]), "No results.");
    }

    #[test]
    fn results_are_ranked_from_one() {
        let hits = vec![
            hit("https://a.example/p1", "exact match text", 1.0),
            hit("https://a.example/p2", "close match", 0.83),
        ];
        let out = format_results(&hits);
        assert!(out.contains("#1  score=1.000  https://a.example/p1"));
        assert!(out.contains("#2  score=0.830  https://a.example/p2"));
    }

    #[test]
    fn snippets_are_truncated_and_flattened() {
        let long = format!("line one\nline two {}", "x".repeat(400));
        let hits = vec![hit("https://a.example", &long, 0.5)];
        let out = format_results(&hits);
        assert!(out.contains("line one line two"));
        // 300 chars of snippet plus the ellipsis, not the full 400+
        assert!(!out.contains(&"x".repeat(301)));
    }
}
