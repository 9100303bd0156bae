//! Retrieval-augmented question answering over a reference document.
//!
//! Two pipelines share one embedding primitive and one vector-store
//! interface:
//!
//! - **Ingestion** ([`Ingestor`]): text → [`ParagraphChunker`] → [`EmbeddingProvider`]
//!   → [`VectorStore::upsert`], in fixed-size batches.
//! - **Query** ([`QueryEngine`]): question → [`Retriever`] → [`PromptTemplate`]
//!   → [`GenerativeProvider`] → answer text.
//!
//! Remote services sit behind the three capability traits, so the
//! orchestrators run unchanged against [`InMemoryVectorStore`] and test
//! doubles.
//!
//! # Feature flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` | OpenAI embeddings and chat completions (default) |
//! | `pinecone` | Pinecone serverless index (default) |

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod inmemory;
pub mod pipeline;
pub mod retrieval;
pub mod text;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pinecone")]
pub mod pinecone;

pub use chunking::{ParagraphChunker, chunk_text};
pub use config::{RagConfig, RagConfigBuilder, ServiceCredentials};
pub use document::{ChatMessage, Chunk, Document, Metric, Role, ScoredMatch, VectorRecord};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generation::GenerativeProvider;
pub use ingest::Ingestor;
pub use inmemory::InMemoryVectorStore;
pub use pipeline::QueryEngine;
pub use retrieval::{PromptTemplate, Retriever, build_prompt};
pub use vectorstore::VectorStore;
