//! The embedding oracle seam.

use async_trait::async_trait;

/// Turns text into fixed-dimension vectors. Treated as a pure function:
/// the same text always maps to the same vector, and every vector is unit
/// length so cosine similarity reduces to a dot product.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
    async fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>>;
}
