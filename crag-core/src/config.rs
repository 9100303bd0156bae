//! Pipeline configuration and service credentials.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunking::DEFAULT_MAX_WORDS;
use crate::document::Metric;
use crate::embedding::DEFAULT_DIMENSIONS;
use crate::error::{RagError, Result};

/// Upper bound for in-flight embedding calls during ingestion.
pub const MAX_EMBED_CONCURRENCY: usize = 32;

/// Tunable parameters shared by ingestion and querying.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Name of the vector index.
    pub index_name: String,
    /// Embedding dimensionality the index is created with.
    pub dimension: usize,
    /// Distance metric the index is created with.
    pub metric: Metric,
    /// Word budget per chunk.
    pub max_words: usize,
    /// Number of contexts retrieved per question.
    pub top_k: usize,
    /// Number of chunks per upsert request.
    pub batch_size: usize,
    /// Maximum concurrent embedding calls during ingestion.
    pub embed_concurrency: usize,
    /// Per-step deadline for query-time remote calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_name: "indian-constitution".to_string(),
            dimension: DEFAULT_DIMENSIONS,
            metric: Metric::Cosine,
            max_words: DEFAULT_MAX_WORDS,
            top_k: 3,
            batch_size: 100,
            embed_concurrency: 5,
            request_timeout: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check every field, as [`RagConfigBuilder::build`] does.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.index_name.trim().is_empty() {
            return Err(RagError::InvalidConfig("index_name must not be empty".into()));
        }
        for (field, value) in [
            ("dimension", self.dimension),
            ("max_words", self.max_words),
            ("top_k", self.top_k),
            ("batch_size", self.batch_size),
            ("embed_concurrency", self.embed_concurrency),
        ] {
            if value == 0 {
                return Err(RagError::InvalidConfig(format!("{field} must be greater than zero")));
            }
        }
        if self.embed_concurrency > MAX_EMBED_CONCURRENCY {
            return Err(RagError::InvalidConfig(format!(
                "embed_concurrency ({}) must not exceed {MAX_EMBED_CONCURRENCY}",
                self.embed_concurrency
            )));
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(RagError::InvalidConfig("request_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the vector index name.
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = name.into();
        self
    }

    /// Set the embedding dimensionality.
    pub fn dimension(mut self, dimension: usize) -> Self {
        self.config.dimension = dimension;
        self
    }

    /// Set the index metric.
    pub fn metric(mut self, metric: Metric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Set the word budget per chunk.
    pub fn max_words(mut self, max_words: usize) -> Self {
        self.config.max_words = max_words;
        self
    }

    /// Set the number of contexts retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the number of chunks per upsert request.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the maximum number of concurrent embedding calls.
    pub fn embed_concurrency(mut self, n: usize) -> Self {
        self.config.embed_concurrency = n;
        self
    }

    /// Set the query-time deadline for each remote step.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Build the [`RagConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if any field is out of range.
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Environment variable holding the embedding/generation credential.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Environment variable holding the vector-store credential.
pub const PINECONE_API_KEY_VAR: &str = "PINECONE_API_KEY";
/// Environment variable holding the vector-store region.
pub const PINECONE_ENVIRONMENT_VAR: &str = "PINECONE_ENVIRONMENT";
/// Optional environment variable holding the vector-store cloud.
pub const PINECONE_CLOUD_VAR: &str = "PINECONE_CLOUD";

/// Secrets and placement hints for the remote services.
///
/// Loaded once at process start and handed to each client constructor.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceCredentials {
    /// Credential for the embedding and generation services.
    pub openai_api_key: String,
    /// Credential for the vector store.
    pub pinecone_api_key: String,
    /// Region the vector index lives in.
    pub pinecone_region: String,
    /// Cloud the vector index lives in.
    pub pinecone_cloud: String,
}

impl fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("openai_api_key", &"<redacted>")
            .field("pinecone_api_key", &"<redacted>")
            .field("pinecone_region", &self.pinecone_region)
            .field("pinecone_cloud", &self.pinecone_cloud)
            .finish()
    }
}

impl ServiceCredentials {
    /// Load credentials from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] naming every missing variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load credentials through an arbitrary lookup function.
    ///
    /// Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_api_key = get(OPENAI_API_KEY_VAR);
        let pinecone_api_key = get(PINECONE_API_KEY_VAR);
        let pinecone_region = get(PINECONE_ENVIRONMENT_VAR);

        let missing: Vec<&str> = [
            (OPENAI_API_KEY_VAR, openai_api_key.is_none()),
            (PINECONE_API_KEY_VAR, pinecone_api_key.is_none()),
            (PINECONE_ENVIRONMENT_VAR, pinecone_region.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        match (openai_api_key, pinecone_api_key, pinecone_region) {
            (Some(openai_api_key), Some(pinecone_api_key), Some(pinecone_region)) => Ok(Self {
                openai_api_key,
                pinecone_api_key,
                pinecone_region,
                pinecone_cloud: get(PINECONE_CLOUD_VAR).unwrap_or_else(|| "aws".to_string()),
            }),
            _ => Err(RagError::InvalidConfig(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            ))),
        }
    }
}
