//! In-memory vector store.
//!
//! [`InMemoryVectorStore`] keeps every index in a `HashMap` behind a
//! `tokio::sync::RwLock`. It is used for tests and offline runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Metric, ScoredMatch, VectorRecord};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, ensure_top_k, ensure_unique_ids};

#[derive(Debug)]
struct Index {
    dimension: usize,
    metric: Metric,
    records: HashMap<String, VectorRecord>,
}

/// An in-memory vector store supporting every [`Metric`].
///
/// Scores are "higher is better" for all metrics: cosine similarity, dot
/// product, or `1 / (1 + distance)` for Euclidean indexes.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    indexes: RwLock<HashMap<String, Index>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the existing indexes, sorted.
    pub async fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of records held by `index`.
    pub async fn len(&self, index: &str) -> Result<usize> {
        let indexes = self.indexes.read().await;
        Ok(lookup(&indexes, index)?.records.len())
    }

    /// The record stored under `id`, if any.
    pub async fn get(&self, index: &str, id: &str) -> Result<Option<VectorRecord>> {
        let indexes = self.indexes.read().await;
        Ok(lookup(&indexes, index)?.records.get(id).cloned())
    }
}

fn lookup<'a>(indexes: &'a HashMap<String, Index>, name: &str) -> Result<&'a Index> {
    indexes.get(name).ok_or_else(|| RagError::IndexNotFound(name.to_string()))
}

fn check_dimension(index: &Index, len: usize) -> Result<()> {
    if len != index.dimension {
        return Err(RagError::InvalidInput(format!(
            "vector has {len} dimensions, index expects {}",
            index.dimension
        )));
    }
    Ok(())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity; 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

fn euclidean_similarity(a: &[f32], b: &[f32]) -> f32 {
    let distance: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt();
    1.0 / (1.0 + distance)
}

fn score(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => cosine_similarity(a, b),
        Metric::DotProduct => dot(a, b),
        Metric::Euclidean => euclidean_similarity(a, b),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_index(&self, name: &str, dimension: usize, metric: Metric) -> Result<()> {
        if name.is_empty() {
            return Err(RagError::InvalidConfig("index name must not be empty".into()));
        }
        if dimension == 0 {
            return Err(RagError::InvalidConfig("dimension must be greater than zero".into()));
        }
        let mut indexes = self.indexes.write().await;
        if indexes.contains_key(name) {
            debug!(index = name, "index already exists, skipping creation");
            return Ok(());
        }
        indexes.insert(name.to_string(), Index { dimension, metric, records: HashMap::new() });
        debug!(index = name, dimension, %metric, "created index");
        Ok(())
    }

    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()> {
        ensure_unique_ids(records)?;
        let mut indexes = self.indexes.write().await;
        let store = indexes.get_mut(index).ok_or_else(|| RagError::IndexNotFound(index.into()))?;
        for record in records {
            check_dimension(store, record.values.len())?;
        }
        for record in records {
            store.records.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>> {
        ensure_top_k(top_k)?;
        let indexes = self.indexes.read().await;
        let store = lookup(&indexes, index)?;
        check_dimension(store, vector.len())?;

        let mut scored: Vec<ScoredMatch> = store
            .records
            .values()
            .map(|record| ScoredMatch {
                id: record.id.clone(),
                score: score(store.metric, &record.values, vector),
                metadata: record.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord { id: id.into(), values, metadata: HashMap::new() }
    }

    #[test]
    fn cosine_of_orthogonal_and_zero_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn euclidean_similarity_is_one_for_identical_vectors() {
        assert!((euclidean_similarity(&[0.5, 0.5], &[0.5, 0.5]) - 1.0).abs() < 1e-6);
        assert!(euclidean_similarity(&[0.0, 0.0], &[3.0, 4.0]) < 0.2);
    }

    #[tokio::test]
    async fn missing_index_is_reported() {
        let store = InMemoryVectorStore::new();
        let err = store.upsert("nope", &[record("a", vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, RagError::IndexNotFound(name) if name == "nope"));
        let err = store.query("nope", &[1.0], 1).await.unwrap_err();
        assert!(matches!(err, RagError::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let store = InMemoryVectorStore::new();
        store.ensure_index("idx", 2, Metric::Cosine).await.unwrap();
        store.upsert("idx", &[record("a", vec![1.0, 0.0])]).await.unwrap();
        store.upsert("idx", &[record("a", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.len("idx").await.unwrap(), 1);
        assert_eq!(store.get("idx", "a").await.unwrap().unwrap().values, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn rejects_duplicate_ids_and_wrong_dimensions() {
        let store = InMemoryVectorStore::new();
        store.ensure_index("idx", 2, Metric::Cosine).await.unwrap();
        let dup = [record("a", vec![1.0, 0.0]), record("a", vec![0.0, 1.0])];
        assert!(matches!(store.upsert("idx", &dup).await, Err(RagError::InvalidInput(_))));
        let short = [record("b", vec![1.0])];
        assert!(matches!(store.upsert("idx", &short).await, Err(RagError::InvalidInput(_))));
        assert_eq!(store.len("idx").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn zero_top_k_is_invalid_config() {
        let store = InMemoryVectorStore::new();
        store.ensure_index("idx", 1, Metric::Cosine).await.unwrap();
        assert!(matches!(store.query("idx", &[1.0], 0).await, Err(RagError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn dot_product_index_ranks_by_magnitude() {
        let store = InMemoryVectorStore::new();
        store.ensure_index("idx", 2, Metric::DotProduct).await.unwrap();
        store
            .upsert("idx", &[record("small", vec![1.0, 0.0]), record("big", vec![3.0, 0.0])])
            .await
            .unwrap();
        let matches = store.query("idx", &[1.0, 0.0], 10).await.unwrap();
        let ids: Vec<_> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["big", "small"]);
    }
}
