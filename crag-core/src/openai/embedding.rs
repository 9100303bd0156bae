use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{OpenAIConfig, PROVIDER, post_json};
use crate::embedding::{DEFAULT_DIMENSIONS, EmbeddingProvider};
use crate::error::{RagError, Result, ensure_non_empty};

/// An [`EmbeddingProvider`] backed by the OpenAI `/embeddings` endpoint.
///
/// Defaults to `text-embedding-ada-002`, which produces 1536-dimensional
/// vectors. Responses of any other length are rejected as malformed.
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    config: OpenAIConfig,
    dimensions: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider from shared OpenAI settings.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if the API key is empty.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        Ok(Self { client: config.http_client()?, config, dimensions: DEFAULT_DIMENSIONS })
    }

    /// Override the expected output dimensionality (for other models).
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding(PROVIDER, "API returned empty response", false))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            ensure_non_empty(text, "embedding input")?;
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.config.embedding_model,
            "embedding batch"
        );

        let request = EmbeddingRequest { model: &self.config.embedding_model, input: texts };
        let response: EmbeddingResponse =
            post_json(&self.client, &self.config, "embeddings", &request).await.map_err(
                |(message, retryable)| {
                    error!(provider = PROVIDER, %message, retryable, "embedding request failed");
                    RagError::embedding(PROVIDER, message, retryable)
                },
            )?;

        let mut data = response.data;
        if data.len() != texts.len() {
            return Err(RagError::embedding(
                PROVIDER,
                format!("expected {} embeddings, got {}", texts.len(), data.len()),
                false,
            ));
        }
        data.sort_by_key(|d| d.index);

        data.into_iter()
            .map(|d| {
                if d.embedding.len() != self.dimensions {
                    return Err(RagError::embedding(
                        PROVIDER,
                        format!(
                            "expected {} dimensions, got {}",
                            self.dimensions,
                            d.embedding.len()
                        ),
                        false,
                    ));
                }
                Ok(d.embedding)
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.config.embedding_model
    }
}
