//! Small text helpers for preprocessing and transcripts.

use std::sync::LazyLock;

use regex::Regex;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid punctuation pattern"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid sentence pattern"));

/// Strip punctuation and collapse whitespace runs to single spaces.
pub fn clean_text(text: &str) -> String {
    let stripped = PUNCTUATION.replace_all(text, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Split on runs of `.`, `!` and `?`, dropping empty pieces.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    SENTENCE_END
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render a question/answer pair for display or export.
pub fn format_qa_pair(question: &str, answer: &str) -> String {
    format!("Q: {question}\nA: {answer}")
}
