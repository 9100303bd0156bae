//! Paragraph-aware chunking.
//!
//! Text is split on blank lines into paragraphs. A paragraph that fits in
//! `max_words` words is kept verbatim as one chunk; a longer paragraph is cut
//! into consecutive windows of `max_words` words joined by single spaces.

use crate::document::Chunk;
use crate::error::{RagError, Result};

/// Default word budget per chunk.
pub const DEFAULT_MAX_WORDS: usize = 150;

/// Splits text into [`Chunk`]s bounded by an approximate word count.
///
/// # Example
///
/// ```rust,ignore
/// use crag_core::ParagraphChunker;
///
/// let chunker = ParagraphChunker::new(150)?;
/// let chunks = chunker.chunk(&corpus);
/// assert_eq!(chunks[0].id, "chunk_0");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ParagraphChunker {
    max_words: usize,
}

impl ParagraphChunker {
    /// Create a chunker with the given word budget.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if `max_words` is zero.
    pub fn new(max_words: usize) -> Result<Self> {
        if max_words == 0 {
            return Err(RagError::InvalidConfig("max_words must be greater than zero".into()));
        }
        Ok(Self { max_words })
    }

    /// The configured word budget.
    pub fn max_words(&self) -> usize {
        self.max_words
    }

    /// Split `text` into chunk strings, in input order.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for paragraph in paragraphs(text) {
            let words: Vec<&str> = paragraph.split_whitespace().collect();
            if words.len() <= self.max_words {
                out.push(paragraph.to_string());
            } else {
                out.extend(words.chunks(self.max_words).map(|window| window.join(" ")));
            }
        }
        out
    }

    /// Split `text` into [`Chunk`]s with ids `chunk_0`, `chunk_1`, ...
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk { id: Chunk::id_for(i), text })
            .collect()
    }
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self { max_words: DEFAULT_MAX_WORDS }
    }
}

/// Split `text` into chunk strings of at most `max_words` words each
/// (only paragraphs longer than the budget are re-flowed).
///
/// # Errors
///
/// Returns [`RagError::InvalidConfig`] if `max_words` is zero.
pub fn chunk_text(text: &str, max_words: usize) -> Result<Vec<String>> {
    Ok(ParagraphChunker::new(max_words)?.split(text))
}

/// Non-empty, trimmed paragraphs of `text`, delimited by whitespace-only lines.
fn paragraphs(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                out.push(text[s..end].trim());
            }
        } else {
            if start.is_none() {
                start = Some(offset);
            }
            end = offset + line.len();
        }
        offset += line.len();
    }

    if let Some(s) = start {
        out.push(text[s..end].trim());
    }

    out
}
