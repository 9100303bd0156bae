//! Generative model trait for composing answers.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that completes a prompt under a system instruction.
///
/// Implementations reject an empty `user_prompt` with
/// [`RagError::InvalidInput`](crate::RagError::InvalidInput) and report remote
/// failures as [`RagError::GenerationService`](crate::RagError::GenerationService).
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Return the model's text completion for one system + user exchange.
    async fn complete(&self, system_instruction: &str, user_prompt: &str) -> Result<String>;

    /// Short name used in logs and error messages.
    fn name(&self) -> &str {
        "generation"
    }
}
