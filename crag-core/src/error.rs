//! Error types for the `crag-core` crate.

use thiserror::Error;

/// Errors that can occur while ingesting or answering.
///
/// Validation failures ([`InvalidInput`](RagError::InvalidInput),
/// [`InvalidConfig`](RagError::InvalidConfig)) are never retryable. Remote
/// failures carry a `retryable` flag so callers can choose between retrying
/// and rejecting; see [`RagError::is_retryable`].
#[derive(Debug, Error)]
pub enum RagError {
    /// Caller-provided data was rejected (empty text, empty prompt, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A configuration value was rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The embedding service call failed.
    #[error("Embedding service error ({provider}): {message}")]
    EmbeddingService {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether repeating the call may succeed.
        retryable: bool,
    },

    /// The generative model call failed.
    #[error("Generation service error ({provider}): {message}")]
    GenerationService {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether repeating the call may succeed.
        retryable: bool,
    },

    /// The vector index was addressed before it was created.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// The vector store call failed for a reason other than a missing index.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
        /// Whether repeating the call may succeed.
        retryable: bool,
    },

    /// A retrieved match is missing the metadata it was stored with.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Ingestion stopped part way. Chunks counted in `ingested` stay persisted.
    #[error("Ingestion aborted after {ingested} chunks: {source}")]
    PartialIngest {
        /// Number of chunks upserted before the failure.
        ingested: usize,
        /// The error that aborted the batch loop.
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    /// Whether the failed operation may succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmbeddingService { retryable, .. }
            | Self::GenerationService { retryable, .. }
            | Self::VectorStore { retryable, .. } => *retryable,
            Self::PartialIngest { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// The innermost error, unwrapping [`RagError::PartialIngest`].
    pub fn root_cause(&self) -> &RagError {
        match self {
            Self::PartialIngest { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn embedding(provider: &str, message: impl Into<String>, retryable: bool) -> Self {
        Self::EmbeddingService {
            provider: provider.to_string(),
            message: message.into(),
            retryable,
        }
    }

    pub(crate) fn generation(provider: &str, message: impl Into<String>, retryable: bool) -> Self {
        Self::GenerationService {
            provider: provider.to_string(),
            message: message.into(),
            retryable,
        }
    }

    pub(crate) fn vector_store(backend: &str, message: impl Into<String>, retryable: bool) -> Self {
        Self::VectorStore { backend: backend.to_string(), message: message.into(), retryable }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Rejects empty or whitespace-only text before any remote call is made.
pub(crate) fn ensure_non_empty(text: &str, what: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(RagError::InvalidInput(format!("{what} must not be empty")));
    }
    Ok(())
}
