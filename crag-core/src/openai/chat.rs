use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{OpenAIConfig, PROVIDER, post_json};
use crate::document::ChatMessage;
use crate::error::{RagError, Result, ensure_non_empty};
use crate::generation::GenerativeProvider;

/// A [`GenerativeProvider`] backed by the OpenAI `/chat/completions` endpoint.
///
/// Each call sends exactly two messages: the system instruction and the
/// user prompt.
pub struct OpenAIChatProvider {
    client: reqwest::Client,
    config: OpenAIConfig,
    temperature: Option<f32>,
}

impl OpenAIChatProvider {
    /// Create a provider from shared OpenAI settings.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if the API key is empty.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        Ok(Self { client: config.http_client()?, config, temperature: None })
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl GenerativeProvider for OpenAIChatProvider {
    async fn complete(&self, system_instruction: &str, user_prompt: &str) -> Result<String> {
        ensure_non_empty(user_prompt, "prompt")?;

        debug!(
            provider = PROVIDER,
            model = %self.config.chat_model,
            prompt_len = user_prompt.len(),
            "requesting completion"
        );

        let mut messages = Vec::with_capacity(2);
        if !system_instruction.trim().is_empty() {
            messages.push(ChatMessage::system(system_instruction));
        }
        messages.push(ChatMessage::user(user_prompt));

        let request = ChatRequest {
            model: &self.config.chat_model,
            messages,
            temperature: self.temperature,
        };
        let response: ChatResponse = post_json(
            &self.client,
            &self.config,
            "chat/completions",
            &request,
        )
        .await
        .map_err(|(message, retryable)| {
            error!(provider = PROVIDER, %message, retryable, "completion request failed");
            RagError::generation(PROVIDER, message, retryable)
        })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::generation(PROVIDER, "response contained no content", false))
    }

    fn name(&self) -> &str {
        &self.config.chat_model
    }
}
