//! Query orchestrator.
//!
//! [`QueryEngine`] composes a [`Retriever`] and a [`GenerativeProvider`]:
//! embed the question → fetch the top-k contexts → build the grounded prompt →
//! generate. Nothing is cached or retried; every failure reaches the caller
//! as a typed [`RagError`].
//!
//! # Example
//!
//! ```rust,ignore
//! use crag_core::{QueryEngine, Retriever};
//!
//! let engine = QueryEngine::new(Retriever::new(embedder, store, "indian-constitution"), generator)
//!     .with_top_k(3)
//!     .with_timeout(Duration::from_secs(30));
//! let answer = engine.answer("What are Fundamental Duties?").await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::config::RagConfig;
use crate::error::{RagError, Result, ensure_non_empty};
use crate::generation::GenerativeProvider;
use crate::retrieval::{PromptTemplate, Retriever};

/// Answers questions from retrieved context.
pub struct QueryEngine {
    retriever: Retriever,
    generator: Arc<dyn GenerativeProvider>,
    prompt: PromptTemplate,
    top_k: usize,
    timeout: Option<Duration>,
}

impl QueryEngine {
    /// Create an engine with the default prompt and `top_k` of 3.
    pub fn new(retriever: Retriever, generator: Arc<dyn GenerativeProvider>) -> Self {
        Self {
            retriever,
            generator,
            prompt: PromptTemplate::default(),
            top_k: RagConfig::default().top_k,
            timeout: None,
        }
    }

    /// Apply `top_k` and `request_timeout` from a configuration.
    pub fn with_config(mut self, config: &RagConfig) -> Self {
        self.top_k = config.top_k;
        self.timeout = config.request_timeout;
        self
    }

    /// Use a different prompt template.
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// Number of contexts retrieved per question.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Deadline applied separately to retrieval and to generation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The prompt template in use.
    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    /// Answer `query` from the indexed corpus.
    ///
    /// With no matching context the model is still asked, with an explicit
    /// "no context" marker in the prompt.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for a blank question
    /// - [`RagError::EmbeddingService`] if embedding fails or times out
    /// - [`RagError::IndexNotFound`] / [`RagError::VectorStore`] from the store
    /// - [`RagError::Retrieval`] if a match lacks its text
    /// - [`RagError::GenerationService`] if generation fails or times out
    #[instrument(skip(self), fields(top_k = self.top_k))]
    pub async fn answer(&self, query: &str) -> Result<String> {
        ensure_non_empty(query, "question")?;

        let contexts = self
            .bounded(self.retriever.retrieve(query, self.top_k), || {
                RagError::embedding("retrieval", "timed out retrieving context", true)
            })
            .await?;
        if contexts.is_empty() {
            warn!("no context found, asking the model anyway");
        }

        let prompt = self.prompt.build(query, &contexts);
        let system = self.prompt.system_instruction();
        let generator = self.generator.name().to_string();
        let answer = self
            .bounded(self.generator.complete(&system, &prompt), || {
                RagError::generation(&generator, "timed out waiting for completion", true)
            })
            .await?;

        info!(contexts = contexts.len(), answer_len = answer.len(), "answered question");
        Ok(answer)
    }

    async fn bounded<T, F>(&self, fut: F, on_timeout: impl FnOnce() -> RagError) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| on_timeout())?,
            None => fut.await,
        }
    }
}
