//! Remote clients wired from process credentials.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use crag_core::openai::{OpenAIChatProvider, OpenAIConfig, OpenAIEmbeddingProvider};
use crag_core::pinecone::{PineconeConfig, PineconeVectorStore};
use crag_core::{
    EmbeddingProvider, GenerativeProvider, Ingestor, QueryEngine, RagConfig, Retriever,
    ServiceCredentials, VectorStore,
};
use tracing::info;

/// The three capability clients plus the configuration they were built for.
pub struct Services {
    pub config: RagConfig,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn GenerativeProvider>,
    pub store: Arc<dyn VectorStore>,
}

impl Services {
    /// Load `.env`, read credentials and build every client.
    ///
    /// Fails before any network call if a credential is missing.
    pub fn connect(config: RagConfig) -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!(path = %path.display(), "loaded environment file");
        }
        let credentials =
            ServiceCredentials::from_env().context("service credentials are not configured")?;
        Self::from_credentials(&credentials, config)
    }

    pub fn from_credentials(
        credentials: &ServiceCredentials,
        config: RagConfig,
    ) -> anyhow::Result<Self> {
        let timeout = config.request_timeout.unwrap_or(Duration::from_secs(60));

        let openai = OpenAIConfig::new(credentials.openai_api_key.clone()).with_timeout(timeout);
        let embedder = OpenAIEmbeddingProvider::new(openai.clone())
            .context("failed to create embedding client")?
            .with_dimensions(config.dimension);
        let generator = OpenAIChatProvider::new(openai).context("failed to create chat client")?;

        let store = PineconeVectorStore::new(
            PineconeConfig::from_credentials(credentials).with_timeout(timeout),
        )
        .context("failed to create vector store client")?;

        info!(
            index = %config.index_name,
            region = %credentials.pinecone_region,
            cloud = %credentials.pinecone_cloud,
            "services configured"
        );

        Ok(Self {
            config,
            embedder: Arc::new(embedder),
            generator: Arc::new(generator),
            store: Arc::new(store),
        })
    }

    /// Create the configured index unless it exists.
    pub async fn ensure_index(&self) -> anyhow::Result<()> {
        self.store
            .ensure_index(&self.config.index_name, self.config.dimension, self.config.metric)
            .await
            .with_context(|| format!("failed to prepare index '{}'", self.config.index_name))
    }

    pub fn ingestor(&self) -> anyhow::Result<Ingestor> {
        Ok(Ingestor::new(&self.config, self.embedder.clone(), self.store.clone())?)
    }

    pub fn query_engine(&self) -> QueryEngine {
        let retriever = Retriever::new(
            self.embedder.clone(),
            self.store.clone(),
            self.config.index_name.clone(),
        );
        QueryEngine::new(retriever, self.generator.clone()).with_config(&self.config)
    }
}
