//! Data types for documents, chunks, stored vectors and search matches.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Metadata key under which a chunk's literal text is stored.
pub const TEXT_KEY: &str = "text";

/// A source corpus, read once at ingestion time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Identifier of the corpus (the file stem when loaded from disk).
    pub id: String,
    /// The full UTF-8 text.
    pub text: String,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Read a UTF-8 text file wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if the file cannot be read or is not UTF-8.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            RagError::InvalidInput(format!("failed to read '{}': {e}", path.display()))
        })?;
        let id = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        Ok(Self { id, text, source_uri: Some(path.display().to_string()) })
    }
}

/// A retrieval-sized slice of a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Stable identifier, `chunk_<offset>`.
    pub id: String,
    /// The chunk text.
    pub text: String,
}

impl Chunk {
    /// Id assigned to the chunk at `offset` in chunker output order.
    pub fn id_for(offset: usize) -> String {
        format!("chunk_{offset}")
    }
}

/// An `(id, vector, metadata)` triple as written to a vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    /// Unique identifier within the index.
    pub id: String,
    /// The embedding.
    pub values: Vec<f32>,
    /// Key-value metadata; ingestion always sets [`TEXT_KEY`].
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl VectorRecord {
    /// Build the record for an embedded chunk.
    pub fn from_chunk(chunk: &Chunk, values: Vec<f32>) -> Self {
        let metadata = HashMap::from([(TEXT_KEY.to_string(), chunk.text.clone())]);
        Self { id: chunk.id.clone(), values, metadata }
    }
}

/// A stored item returned by a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredMatch {
    /// The stored identifier.
    pub id: String,
    /// Similarity score (higher is more relevant).
    pub score: f32,
    /// The stored metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ScoredMatch {
    /// The chunk text carried in metadata, if present.
    pub fn text(&self) -> Option<&str> {
        self.metadata.get(TEXT_KEY).map(String::as_str)
    }
}

/// Distance metric an index is configured with.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity.
    #[default]
    Cosine,
    /// Euclidean distance.
    Euclidean,
    /// Raw dot product.
    DotProduct,
}

impl Metric {
    /// The wire name used by vector-store APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::DotProduct => "dotproduct",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Metric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" => Ok(Metric::Euclidean),
            "dotproduct" | "dot_product" => Ok(Metric::DotProduct),
            other => Err(RagError::InvalidConfig(format!("unknown metric '{other}'"))),
        }
    }
}

/// Speaker of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the model.
    System,
    /// The person asking.
    User,
    /// The model.
    Assistant,
}

/// One `{role, content}` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Who is speaking.
    pub role: Role,
    /// What was said.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}
