//! Client for an OpenAI-compatible `/embeddings` endpoint.
//!
//! The embedding model is an external oracle: text in, fixed-dimension
//! vector out. Responses are re-ordered by the `index` field, checked
//! against the configured dimension, and unit-normalized so that cosine
//! similarity downstream reduces to a dot product.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sitesense_core::TextEmbedder;

pub struct EmbedClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    expected_dimension: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl EmbedClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            expected_dimension: None,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Reject vectors whose width differs from the served model's dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }

    async fn request(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input,
        };

        debug!(model = %self.model, "Embedding request");

        let mut builder = self.http.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Embedding API error ({}): {}", status, error_text));
        }

        let parsed: EmbeddingResponse = response.json().await?;

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        data.into_iter()
            .map(|d| {
                if let Some(expected) = self.expected_dimension {
                    if d.embedding.len() != expected {
                        return Err(anyhow!(
                            "Embedding dimension mismatch: got {}, expected {}",
                            d.embedding.len(),
                            expected
                        ));
                    }
                }
                Ok(l2_normalize(d.embedding))
            })
            .collect()
    }
}

#[async_trait]
impl TextEmbedder for EmbedClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self
            .request(serde_json::Value::String(text.to_string()))
            .await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No embedding in response"))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let count = texts.len();
        let input = serde_json::Value::Array(
            texts.into_iter().map(serde_json::Value::String).collect(),
        );
        let vectors = self.request(input).await?;
        if vectors.len() != count {
            return Err(anyhow!(
                "Embedding count mismatch: got {}, expected {}",
                vectors.len(),
                count
            ));
        }
        Ok(vectors)
    }
}

/// Scale a vector to unit length. Zero vectors are returned as-is.
pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn normalization_yields_unit_length() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((norm(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_survives_normalization() {
        let v = l2_normalize(vec![0.0, 0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn unit_vector_is_unchanged() {
        let v = l2_normalize(vec![1.0, 0.0]);
        assert_eq!(v, vec![1.0, 0.0]);
    }

    #[test]
    fn response_rows_sort_by_index() {
        let mut data = vec![
            EmbeddingData {
                index: 1,
                embedding: vec![1.0],
            },
            EmbeddingData {
                index: 0,
                embedding: vec![2.0],
            },
        ];
        data.sort_by_key(|d| d.index);
        assert_eq!(data[0].embedding, vec![2.0]);
    }
}
