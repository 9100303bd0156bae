//! Ingestion orchestrator: chunk → embed → upsert, in bounded batches.

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{error, info, warn};

use crate::chunking::ParagraphChunker;
use crate::config::RagConfig;
use crate::document::{Chunk, VectorRecord};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Drives a corpus into the vector store.
///
/// Chunks get positional ids (`chunk_0`, `chunk_1`, ...) so re-running the
/// same corpus overwrites rather than duplicates. Batches are upserted in
/// order; within a batch, up to `embed_concurrency` embedding calls run at
/// once. There is no rollback: batches that were upserted before a failure
/// stay persisted.
pub struct Ingestor {
    chunker: ParagraphChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    index: String,
    batch_size: usize,
    concurrency: usize,
}

impl Ingestor {
    /// Build an ingestor from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if `config` does not validate or
    /// the embedder's dimensionality differs from `config.dimension`.
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dimensions() != config.dimension {
            return Err(RagError::InvalidConfig(format!(
                "embedder '{}' produces {} dimensions, index expects {}",
                embedder.name(),
                embedder.dimensions(),
                config.dimension
            )));
        }
        Ok(Self {
            chunker: ParagraphChunker::new(config.max_words)?,
            embedder,
            store,
            index: config.index_name.clone(),
            batch_size: config.batch_size,
            concurrency: config.embed_concurrency,
        })
    }

    /// The index this ingestor writes to.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Chunk, embed and upsert `text`. Returns the number of chunks stored.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PartialIngest`] wrapping the first failure, with
    /// the number of chunks already persisted.
    pub async fn ingest(&self, text: &str) -> Result<usize> {
        let chunks = self.chunker.chunk(text);
        let total = chunks.len();
        if total == 0 {
            warn!(index = %self.index, "corpus produced no chunks, nothing to ingest");
            return Ok(0);
        }
        info!(index = %self.index, total, "chunks to process");

        let mut ingested = 0;
        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let result = async {
                let records = self.embed_batch(batch).await?;
                self.store.upsert(&self.index, &records).await
            }
            .await;

            if let Err(e) = result {
                error!(
                    index = %self.index,
                    batch = batch_no,
                    ingested,
                    error = %e,
                    "ingestion aborted"
                );
                return Err(RagError::PartialIngest { ingested, source: Box::new(e) });
            }

            ingested += batch.len();
            info!(index = %self.index, "Processed {ingested}/{total} chunks");
        }

        Ok(ingested)
    }

    /// Embed one batch with bounded concurrency, keeping chunk order.
    async fn embed_batch(&self, batch: &[Chunk]) -> Result<Vec<VectorRecord>> {
        stream::iter(batch)
            .map(|chunk| async move {
                let values = self.embedder.embed(&chunk.text).await?;
                Ok::<_, RagError>(VectorRecord::from_chunk(chunk, values))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}
