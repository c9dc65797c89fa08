//! Text embedding capability.

use async_trait::async_trait;

use crate::types::RagError;

/// Maps text to fixed-dimension vectors.
///
/// Implementations wrap an external embedding model. The dimension is fixed
/// per embedder instance; the vector index enforces that every stored vector
/// matches it.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embedding dimension `D` produced by this embedder.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;

    /// Embed a batch of texts, preserving input order.
    ///
    /// The default implementation loops over [`TextEmbedder::embed`];
    /// implementations with a native batch endpoint should override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}
