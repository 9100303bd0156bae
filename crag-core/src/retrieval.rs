//! Context retrieval and grounded prompt assembly.

use std::sync::Arc;

use tracing::{debug, error};

use crate::document::TEXT_KEY;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result, ensure_non_empty};
use crate::vectorstore::VectorStore;

/// Embeds a question and returns the texts of its nearest chunks.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    index: String,
}

impl Retriever {
    /// Create a retriever reading from `index`.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        index: impl Into<String>,
    ) -> Self {
        Self { embedder, store, index: index.into() }
    }

    /// Up to `top_k` chunk texts, most similar first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for a blank query,
    /// [`RagError::InvalidConfig`] for a zero `top_k`, and
    /// [`RagError::Retrieval`] if any match lacks its `text` metadata.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        ensure_non_empty(query, "query")?;
        if top_k == 0 {
            return Err(RagError::InvalidConfig("top_k must be greater than zero".into()));
        }

        let embedding = self.embedder.embed(query).await?;
        let matches = self.store.query(&self.index, &embedding, top_k).await?;
        debug!(index = %self.index, top_k, returned = matches.len(), "retrieved matches");

        matches
            .into_iter()
            .take(top_k)
            .map(|m| match m.text() {
                Some(text) => Ok(text.to_string()),
                None => {
                    error!(index = %self.index, id = %m.id, "match is missing text metadata");
                    Err(RagError::Retrieval(format!(
                        "match '{}' has no '{TEXT_KEY}' metadata",
                        m.id
                    )))
                }
            })
            .collect()
    }
}

/// Marker placed in the context block when nothing was retrieved.
pub const NO_CONTEXT_MARKER: &str = "(No relevant context was found for this question.)";

/// Default subject the assistant is framed as an expert on.
pub const DEFAULT_DOMAIN: &str = "the Indian Constitution";

/// Instruction template for grounded answers.
///
/// The built prompt frames the model as a domain expert, restricts it to the
/// supplied context, tells it to say so when the context is insufficient,
/// embeds the context and the literal question, and asks for a specific,
/// accurate answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    domain: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN)
    }
}

impl PromptTemplate {
    /// A template for questions about `domain`.
    pub fn new(domain: impl Into<String>) -> Self {
        Self { domain: domain.into() }
    }

    /// The subject this template frames the model as an expert on.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The system message sent alongside every prompt.
    pub fn system_instruction(&self) -> String {
        format!(
            "You are an expert on {}, providing accurate and detailed answers \
             based on the provided context.",
            self.domain
        )
    }

    /// Assemble the user prompt from `query` and ranked `contexts`.
    pub fn build(&self, query: &str, contexts: &[String]) -> String {
        let context_block =
            if contexts.is_empty() { NO_CONTEXT_MARKER.to_string() } else { contexts.join("\n\n") };

        format!(
            "You are an expert on {domain}. Answer the question using only the provided context.\n\
             If the context doesn't contain relevant information, say so.\n\
             Be specific and accurate in your response.\n\
             \n\
             Context:\n\
             {context_block}\n\
             \n\
             Question: {query}\n\
             \n\
             Answer:",
            domain = self.domain,
        )
    }
}

/// [`PromptTemplate::build`] with the default template.
pub fn build_prompt(query: &str, contexts: &[String]) -> String {
    PromptTemplate::default().build(query, contexts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_contexts_question_and_fallback_instruction() {
        let prompt = build_prompt("What is X?", &["ctx1".to_string(), "ctx2".to_string()]);
        assert!(prompt.contains("ctx1"));
        assert!(prompt.contains("ctx2"));
        assert!(prompt.contains("What is X?"));
        assert!(prompt.contains("doesn't contain relevant information, say so"));
        assert!(prompt.contains("expert on the Indian Constitution"));
        assert!(!prompt.contains(NO_CONTEXT_MARKER));
    }

    #[test]
    fn contexts_keep_rank_order_separated_by_blank_line() {
        let prompt = build_prompt("q", &["first".to_string(), "second".to_string()]);
        let first = prompt.find("first").unwrap();
        let second = prompt.find("second").unwrap();
        assert!(first < second);
        assert!(prompt.contains("first\n\nsecond"));
    }

    #[test]
    fn empty_contexts_are_signalled() {
        let prompt = build_prompt("q", &[]);
        assert!(prompt.contains(NO_CONTEXT_MARKER));
    }

    #[test]
    fn build_is_deterministic() {
        let contexts = vec!["a".to_string(), "b".to_string()];
        assert_eq!(build_prompt("q", &contexts), build_prompt("q", &contexts));
    }

    #[test]
    fn custom_domain_flows_into_system_instruction() {
        let template = PromptTemplate::new("maritime law");
        assert!(template.system_instruction().contains("maritime law"));
        assert!(template.build("q", &[]).starts_with("You are an expert on maritime law."));
    }
}
