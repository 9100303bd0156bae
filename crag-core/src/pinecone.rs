//! Pinecone vector store backend.
//!
//! Provides [`PineconeVectorStore`], which implements [`VectorStore`] over the
//! Pinecone REST API using `reqwest`. Index administration goes to the control
//! plane; upserts and queries go to the per-index host returned by
//! `describe_index`, which is cached after the first lookup.
//!
//! This module is only available when the `pinecone` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use crag_core::pinecone::{PineconeConfig, PineconeVectorStore};
//!
//! let store = PineconeVectorStore::new(PineconeConfig::from_credentials(&credentials))?;
//! store.ensure_index("indian-constitution", 1536, Metric::Cosine).await?;
//! store.upsert("indian-constitution", &records).await?;
//! let matches = store.query("indian-constitution", &embedding, 3).await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::ServiceCredentials;
use crate::document::{Metric, ScoredMatch, VectorRecord};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, ensure_top_k, ensure_unique_ids};

/// The default Pinecone control-plane URL.
pub const PINECONE_CONTROL_PLANE: &str = "https://api.pinecone.io";

/// The REST API version sent with every request.
pub const PINECONE_API_VERSION: &str = "2024-07";

const BACKEND: &str = "pinecone";

/// Connection settings for [`PineconeVectorStore`].
#[derive(Clone)]
pub struct PineconeConfig {
    /// API key sent in the `Api-Key` header.
    pub api_key: String,
    /// Serverless cloud hint used when creating an index.
    pub cloud: String,
    /// Serverless region hint used when creating an index.
    pub region: String,
    /// Control-plane base URL.
    pub control_plane_url: String,
    /// Delay between readiness checks after creating an index.
    pub ready_poll_interval: Duration,
    /// Readiness checks before giving up.
    pub ready_max_attempts: u32,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for PineconeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeConfig")
            .field("cloud", &self.cloud)
            .field("region", &self.region)
            .field("control_plane_url", &self.control_plane_url)
            .field("ready_poll_interval", &self.ready_poll_interval)
            .field("ready_max_attempts", &self.ready_max_attempts)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PineconeConfig {
    /// Settings for a serverless index in `cloud`/`region`.
    pub fn new(
        api_key: impl Into<String>,
        cloud: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            cloud: cloud.into(),
            region: region.into(),
            control_plane_url: PINECONE_CONTROL_PLANE.to_string(),
            ready_poll_interval: Duration::from_secs(2),
            ready_max_attempts: 30,
            timeout: None,
        }
    }

    /// Settings taken from process credentials.
    pub fn from_credentials(credentials: &ServiceCredentials) -> Self {
        Self::new(
            credentials.pinecone_api_key.clone(),
            credentials.pinecone_cloud.clone(),
            credentials.pinecone_region.clone(),
        )
    }

    /// Override the control-plane URL.
    pub fn with_control_plane_url(mut self, url: impl Into<String>) -> Self {
        self.control_plane_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Configure readiness polling after index creation.
    pub fn with_ready_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.ready_poll_interval = interval;
        self.ready_max_attempts = max_attempts;
        self
    }

    /// Fail requests that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A [`VectorStore`] backed by [Pinecone](https://www.pinecone.io/).
pub struct PineconeVectorStore {
    client: reqwest::Client,
    config: PineconeConfig,
    hosts: RwLock<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, Value>>,
}

impl QueryMatch {
    fn into_scored(self) -> ScoredMatch {
        let metadata = self
            .metadata
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();
        ScoredMatch { id: self.id, score: self.score, metadata }
    }
}

fn transport_error(e: &reqwest::Error) -> RagError {
    error!(backend = BACKEND, error = %e, "request failed");
    let retryable = e.is_timeout() || e.is_connect();
    RagError::vector_store(BACKEND, format!("request failed: {e}"), retryable)
}

async fn status_error(response: reqwest::Response, action: &str) -> RagError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!(backend = BACKEND, %status, action, "API error");
    let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
    RagError::vector_store(BACKEND, format!("{action} returned {status}: {body}"), retryable)
}

impl PineconeVectorStore {
    /// Create a store client.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if the API key or region is empty.
    pub fn new(config: PineconeConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(RagError::InvalidConfig("Pinecone API key must not be empty".into()));
        }
        if config.region.trim().is_empty() {
            return Err(RagError::InvalidConfig("Pinecone region must not be empty".into()));
        }
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RagError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config, hosts: RwLock::new(HashMap::new()) })
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
    }

    fn data_url(host: &str, path: &str) -> String {
        let host = host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/{path}")
        } else {
            format!("https://{host}/{path}")
        }
    }

    /// Describe `name`; `None` if it does not exist.
    async fn describe(&self, name: &str) -> Result<Option<IndexDescription>> {
        let url = format!("{}/indexes/{name}", self.config.control_plane_url);
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let description = response.json::<IndexDescription>().await.map_err(|e| {
                    let message = format!("malformed index description: {e}");
                    RagError::vector_store(BACKEND, message, false)
                })?;
                Ok(Some(description))
            }
            _ => Err(status_error(response, "describe_index").await),
        }
    }

    async fn create(&self, name: &str, dimension: usize, metric: Metric) -> Result<()> {
        let url = format!("{}/indexes", self.config.control_plane_url);
        let body = json!({
            "name": name,
            "dimension": dimension,
            "metric": metric.as_str(),
            "spec": {
                "serverless": { "cloud": self.config.cloud, "region": self.config.region }
            }
        });
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        match response.status() {
            StatusCode::CONFLICT => {
                debug!(index = name, "index was created concurrently");
                Ok(())
            }
            status if status.is_success() => {
                info!(index = name, dimension, %metric, "created Pinecone index");
                Ok(())
            }
            _ => Err(status_error(response, "create_index").await),
        }
    }

    async fn wait_until_ready(&self, name: &str) -> Result<()> {
        for attempt in 1..=self.config.ready_max_attempts {
            if let Some(description) = self.describe(name).await? {
                if description.status.ready {
                    self.hosts.write().await.insert(name.to_string(), description.host);
                    return Ok(());
                }
            }
            debug!(index = name, attempt, "waiting for index to become ready");
            tokio::time::sleep(self.config.ready_poll_interval).await;
        }
        warn!(index = name, "index did not become ready in time");
        Err(RagError::vector_store(BACKEND, format!("index '{name}' is not ready"), true))
    }

    /// Data-plane host of `index`, resolved once and cached.
    async fn host(&self, index: &str) -> Result<String> {
        if let Some(host) = self.hosts.read().await.get(index) {
            return Ok(host.clone());
        }
        let description =
            self.describe(index).await?.ok_or_else(|| RagError::IndexNotFound(index.into()))?;
        self.hosts.write().await.insert(index.to_string(), description.host.clone());
        Ok(description.host)
    }

    async fn post_data<B: Serialize + ?Sized>(
        &self,
        index: &str,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let host = self.host(index).await?;
        let response = self
            .request(reqwest::Method::POST, &Self::data_url(&host, path))
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => {
                self.hosts.write().await.remove(index);
                Err(RagError::IndexNotFound(index.to_string()))
            }
            _ => Err(status_error(response, path).await),
        }
    }
}

#[async_trait]
impl VectorStore for PineconeVectorStore {
    async fn ensure_index(&self, name: &str, dimension: usize, metric: Metric) -> Result<()> {
        if name.is_empty() {
            return Err(RagError::InvalidConfig("index name must not be empty".into()));
        }
        if let Some(description) = self.describe(name).await? {
            info!(index = name, "index already exists, skipping creation");
            if !description.status.ready {
                return self.wait_until_ready(name).await;
            }
            self.hosts.write().await.insert(name.to_string(), description.host);
            return Ok(());
        }
        self.create(name, dimension, metric).await?;
        self.wait_until_ready(name).await
    }

    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        ensure_unique_ids(records)?;
        debug!(index, count = records.len(), "upserting vectors");
        self.post_data(index, "vectors/upsert", &UpsertRequest { vectors: records }).await?;
        Ok(())
    }

    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>> {
        ensure_top_k(top_k)?;
        let request =
            QueryRequest { vector, top_k, include_metadata: true, include_values: false };
        let response = self.post_data(index, "query", &request).await?;
        let body: QueryResponse = response.json().await.map_err(|e| {
            RagError::vector_store(BACKEND, format!("malformed query response: {e}"), false)
        })?;

        let mut matches: Vec<ScoredMatch> =
            body.matches.into_iter().map(QueryMatch::into_scored).collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        debug!(index, top_k, returned = matches.len(), "query completed");
        Ok(matches)
    }
}
