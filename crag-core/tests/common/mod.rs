//! Test doubles for the capability traits.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use crag_core::{
    EmbeddingProvider, GenerativeProvider, InMemoryVectorStore, Metric, RagError, Result,
    ScoredMatch, VectorRecord, VectorStore,
};

pub const DIM: usize = 16;

/// Deterministic hash-based embeddings.
pub struct StubEmbedder {
    pub dimensions: usize,
    pub calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, calls: AtomicUsize::new(0) }
    }
}

pub fn hash_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    let mut emb: Vec<f32> =
        (0..dimensions).map(|i| ((hash.wrapping_add(i as u64)) as f32).sin()).collect();
    let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        emb.iter_mut().for_each(|x| *x /= norm);
    }
    emb
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::InvalidInput("embedding input must not be empty".into()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(hash_embedding(text, self.dimensions))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Always fails as a timed-out remote call would.
pub struct TimingOutEmbedder;

#[async_trait]
impl EmbeddingProvider for TimingOutEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingService {
            provider: "stub".into(),
            message: "operation timed out".into(),
            retryable: true,
        })
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Sleeps before answering, to exercise deadlines.
pub struct SlowEmbedder {
    pub delay: Duration,
}

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        Ok(hash_embedding(text, DIM))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Tracks the peak number of concurrent `embed` calls.
#[derive(Default)]
pub struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for ConcurrencyProbe {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(hash_embedding(text, DIM))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Returns a canned answer and records every prompt it was given.
pub struct RecordingGenerator {
    pub reply: String,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl RecordingGenerator {
    pub fn new(reply: &str) -> Self {
        Self { reply: reply.to_string(), prompts: Mutex::new(Vec::new()) }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().map(|(_, user)| user.clone())
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeProvider for RecordingGenerator {
    async fn complete(&self, system_instruction: &str, user_prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_instruction.to_string(), user_prompt.to_string()));
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Sleeps before completing, to exercise the generation deadline.
pub struct SlowGenerator {
    pub delay: Duration,
}

#[async_trait]
impl GenerativeProvider for SlowGenerator {
    async fn complete(&self, _system_instruction: &str, _user_prompt: &str) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok("too late".to_string())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Always fails the way an overloaded completion endpoint does.
pub struct FailingGenerator;

#[async_trait]
impl GenerativeProvider for FailingGenerator {
    async fn complete(&self, _system_instruction: &str, _user_prompt: &str) -> Result<String> {
        Err(RagError::GenerationService {
            provider: "stub".to_string(),
            message: "503 Service Unavailable".to_string(),
            retryable: true,
        })
    }
}

/// A store that returns a fixed match list, ignoring the query vector.
pub struct FixedStore {
    pub matches: Vec<ScoredMatch>,
}

impl FixedStore {
    pub fn with_texts(scored: &[(&str, f32)]) -> Self {
        let matches = scored
            .iter()
            .enumerate()
            .map(|(i, (text, score))| ScoredMatch {
                id: format!("chunk_{i}"),
                score: *score,
                metadata: HashMap::from([("text".to_string(), text.to_string())]),
            })
            .collect();
        Self { matches }
    }
}

#[async_trait]
impl VectorStore for FixedStore {
    async fn ensure_index(&self, _name: &str, _dimension: usize, _metric: Metric) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, _index: &str, _records: &[VectorRecord]) -> Result<()> {
        Ok(())
    }

    async fn query(&self, _index: &str, _vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>> {
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }
}

/// Wraps an [`InMemoryVectorStore`] and fails the n-th upsert (1-based).
pub struct FlakyStore {
    pub inner: InMemoryVectorStore,
    pub fail_on: usize,
    pub upserts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(fail_on: usize) -> Self {
        Self { inner: InMemoryVectorStore::new(), fail_on, upserts: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl VectorStore for FlakyStore {
    async fn ensure_index(&self, name: &str, dimension: usize, metric: Metric) -> Result<()> {
        self.inner.ensure_index(name, dimension, metric).await
    }

    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()> {
        let n = self.upserts.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on {
            return Err(RagError::VectorStore {
                backend: "flaky".into(),
                message: "503 Service Unavailable".into(),
                retryable: true,
            });
        }
        self.inner.upsert(index, records).await
    }

    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>> {
        self.inner.query(index, vector, top_k).await
    }
}
