//! Vector store trait for indexing and searching embeddings.

use async_trait::async_trait;

use crate::document::{Metric, ScoredMatch, VectorRecord};
use crate::error::{RagError, Result};

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named indexes and support idempotent creation,
/// batched upserts and top-k queries.
///
/// # Example
///
/// ```rust,ignore
/// use crag_core::{InMemoryVectorStore, Metric, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.ensure_index("constitution", 1536, Metric::Cosine).await?;
/// store.upsert("constitution", &records).await?;
/// let matches = store.query("constitution", &query_embedding, 3).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the index if it does not exist.
    ///
    /// An existing index is left untouched regardless of its configuration.
    async fn ensure_index(&self, name: &str, dimension: usize, metric: Metric) -> Result<()>;

    /// Insert or overwrite records by id.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotFound`] if the index does not exist.
    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()>;

    /// Return up to `top_k` records nearest to `vector`, best first.
    ///
    /// A `top_k` larger than the index returns everything available.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if `top_k` is zero and
    /// [`RagError::IndexNotFound`] if the index does not exist.
    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>>;
}

/// Shared `top_k` validation for [`VectorStore::query`] implementations.
pub(crate) fn ensure_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(RagError::InvalidConfig("top_k must be greater than zero".into()));
    }
    Ok(())
}

/// Rejects a batch that repeats an id.
pub(crate) fn ensure_unique_ids(records: &[VectorRecord]) -> Result<()> {
    let mut seen = std::collections::HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id.as_str()) {
            return Err(RagError::InvalidInput(format!(
                "duplicate id '{}' in upsert batch",
                record.id
            )));
        }
    }
    Ok(())
}
