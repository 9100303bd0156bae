//! Embedding provider trait for turning text into vectors.

use async_trait::async_trait;

use crate::error::Result;

/// Dimensionality of the embeddings the default index is created with.
pub const DEFAULT_DIMENSIONS: usize = 1536;

/// A provider that generates vector embeddings from text input.
///
/// Implementations must reject empty or whitespace-only input with
/// [`RagError::InvalidInput`](crate::RagError::InvalidInput) rather than
/// returning a zero vector, and must report remote failures as
/// [`RagError::EmbeddingService`](crate::RagError::EmbeddingService).
///
/// # Example
///
/// ```rust,ignore
/// use crag_core::EmbeddingProvider;
///
/// let embedding = provider.embed("What are Fundamental Duties?").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially. Override it if the backend supports native batching.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Short name used in logs and error messages.
    fn name(&self) -> &str {
        "embedding"
    }
}
