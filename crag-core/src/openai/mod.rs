//! OpenAI embedding and chat-completion providers.
//!
//! Both call the REST API directly through `reqwest`. This module is only
//! available when the `openai` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use crag_core::openai::{OpenAIChatProvider, OpenAIConfig, OpenAIEmbeddingProvider};
//!
//! let config = OpenAIConfig::new(credentials.openai_api_key.clone())
//!     .with_timeout(Duration::from_secs(30));
//! let embedder = OpenAIEmbeddingProvider::new(config.clone())?;
//! let generator = OpenAIChatProvider::new(config)?;
//! ```

mod chat;
mod embedding;

use std::time::Duration;

use serde::Deserialize;

pub use chat::OpenAIChatProvider;
pub use embedding::OpenAIEmbeddingProvider;

use crate::error::{RagError, Result};

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// The default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// The default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

const PROVIDER: &str = "OpenAI";

/// Connection settings shared by the OpenAI providers.
#[derive(Clone)]
pub struct OpenAIConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// API base URL, without a trailing slash.
    pub base_url: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Chat model name.
    pub chat_model: String,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("chat_model", &self.chat_model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl OpenAIConfig {
    /// Settings for the public API with default models.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_API_BASE.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            timeout: None,
        }
    }

    /// Point at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the embedding model name.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Set the chat model name.
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Fail requests that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn http_client(&self) -> Result<reqwest::Client> {
        if self.api_key.trim().is_empty() {
            return Err(RagError::InvalidConfig("OpenAI API key must not be empty".into()));
        }
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| RagError::InvalidConfig(format!("failed to build HTTP client: {e}")))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Timeouts, connection failures, 429 and 5xx may succeed on retry.
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_transient_transport(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

/// Send a JSON POST and decode the JSON reply.
///
/// Failures are returned as `(message, retryable)` so each provider can wrap
/// them in its own error variant.
async fn post_json<B, R>(
    client: &reqwest::Client,
    config: &OpenAIConfig,
    path: &str,
    body: &B,
) -> std::result::Result<R, (String, bool)>
where
    B: serde::Serialize + ?Sized,
    R: serde::de::DeserializeOwned,
{
    let response = client
        .post(config.url(path))
        .bearer_auth(&config.api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| (format!("request failed: {e}"), is_transient_transport(&e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail =
            serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
        return Err((format!("API returned {status}: {detail}"), is_transient_status(status)));
    }

    response
        .json::<R>()
        .await
        .map_err(|e| (format!("failed to parse response: {e}"), is_transient_transport(&e)))
}
