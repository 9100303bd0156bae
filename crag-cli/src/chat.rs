//! Interactive question-and-answer session.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use crag_core::text::{clean_text, format_qa_pair};
use crag_core::{QueryEngine, RagError, Role};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

pub const SAMPLE_QUESTIONS: [&str; 4] = [
    "Who was the Chairman of the Drafting Committee?",
    "What are Fundamental Duties?",
    "How many languages are officially recognized?",
    "What is the Panchayati Raj system?",
];

/// One entry in the session log.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// Ordered log of one chat session. Lives only as long as the process.
#[derive(Debug, Serialize)]
pub struct Transcript {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    turns: Vec<Turn>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self { session_id: Uuid::new_v4(), started_at: Utc::now(), turns: Vec::new() }
    }

    pub fn record(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn { role, content: content.into(), at: Utc::now() });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Human-readable history, one line per turn.
    pub fn render(&self) -> String {
        if self.turns.is_empty() {
            return "(no messages yet)".to_string();
        }
        self.turns
            .iter()
            .map(|turn| {
                let who = match turn.role {
                    Role::User => "You",
                    Role::Assistant => "Assistant",
                    Role::System => "System",
                };
                format!("[{}] {who}: {}", turn.at.format("%H:%M:%S"), turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Question/answer pairs in order, each user turn matched with the
    /// assistant turn that follows it.
    pub fn qa_pairs(&self) -> Vec<(&str, &str)> {
        self.turns
            .windows(2)
            .filter_map(|pair| match (&pair[0].role, &pair[1].role) {
                (Role::User, Role::Assistant) => {
                    Some((pair[0].content.as_str(), pair[1].content.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    /// The Q/A pairs rendered with [`format_qa_pair`], blank-line separated.
    pub fn export(&self) -> String {
        self.qa_pairs()
            .into_iter()
            .map(|(q, a)| format_qa_pair(q, a))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<usize> {
        let pairs = self.qa_pairs().len();
        let mut body = self.export();
        body.push('\n');
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("failed to write transcript to {}", path.display()))?;
        Ok(pairs)
    }
}

/// A parsed line of user input.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Empty,
    Exit,
    Help,
    History,
    Save(PathBuf),
    Question(String),
}

impl Input {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::Empty);
        }
        if !line.starts_with('/') {
            return Ok(Self::Question(line.to_string()));
        }
        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        match command {
            "/exit" | "/quit" => Ok(Self::Exit),
            "/help" => Ok(Self::Help),
            "/history" => Ok(Self::History),
            "/save" if !rest.trim().is_empty() => Ok(Self::Save(PathBuf::from(rest.trim()))),
            "/save" => Err("usage: /save <path>".to_string()),
            other => Err(format!("unknown command {other}, try /help")),
        }
    }
}

/// What the session wants printed after handling one line.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Nothing,
    Answer(String),
    Notice(String),
    Failure(String),
    Quit,
}

/// Message shown to the user when a question could not be answered.
pub fn describe_failure(err: &RagError) -> String {
    match err.root_cause() {
        RagError::IndexNotFound(index) => {
            format!(
                "The index '{index}' does not exist yet. \
                 Run `crag init-index` and `crag ingest` first."
            )
        }
        RagError::InvalidInput(msg) => format!("That question could not be processed: {msg}"),
        e if e.is_retryable() => {
            "A service is temporarily unavailable. Please try again in a moment.".to_string()
        }
        e => format!("Sorry, something went wrong while answering: {e}"),
    }
}

/// Chat state: the engine, the transcript and the last question asked.
pub struct ChatSession<'a> {
    engine: &'a QueryEngine,
    transcript: Transcript,
    last_question: Option<String>,
}

impl<'a> ChatSession<'a> {
    pub fn new(engine: &'a QueryEngine) -> Self {
        Self { engine, transcript: Transcript::new(), last_question: None }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Handle one line of input.
    pub async fn handle(&mut self, line: &str) -> Reply {
        let input = match Input::parse(line) {
            Ok(input) => input,
            Err(msg) => return Reply::Notice(msg),
        };

        match input {
            Input::Empty => Reply::Nothing,
            Input::Exit => Reply::Quit,
            Input::Help => Reply::Notice(help_text()),
            Input::History => Reply::Notice(self.transcript.render()),
            Input::Save(path) => match self.transcript.save(&path).await {
                Ok(pairs) => {
                    Reply::Notice(format!("Saved {pairs} Q/A pairs to {}", path.display()))
                }
                Err(e) => Reply::Failure(format!("{e:#}")),
            },
            Input::Question(question) => self.ask(question).await,
        }
    }

    async fn ask(&mut self, question: String) -> Reply {
        let key = question_key(&question);
        if self.last_question.as_deref() == Some(key.as_str()) {
            return Reply::Notice("You just asked that. See the answer above.".to_string());
        }

        match self.engine.answer(&question).await {
            Ok(answer) => {
                self.last_question = Some(key);
                self.transcript.record(Role::User, question);
                self.transcript.record(Role::Assistant, answer.as_str());
                Reply::Answer(answer)
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "question failed");
                Reply::Failure(describe_failure(&e))
            }
        }
    }
}

/// Punctuation, spacing and case do not make a question new.
fn question_key(question: &str) -> String {
    clean_text(question).to_lowercase()
}

fn help_text() -> String {
    [
        "Type a question and press Enter.",
        "  /history       show this session's messages",
        "  /save <path>   export the Q/A pairs to a file",
        "  /exit          leave the chat",
    ]
    .join("\n")
}

/// Run the REPL until `/exit` or end of input.
pub async fn run(engine: &QueryEngine) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new().context("failed to initialise line editor")?;
    let mut session = ChatSession::new(engine);
    info!(session_id = %session.transcript().session_id, "chat session started");

    println!("Indian Constitution RAG Bot");
    println!("Ask any question about the Indian Constitution. Type /help for commands.\n");
    println!("Sample questions:");
    for question in SAMPLE_QUESTIONS {
        println!("  - {question}");
    }
    println!();

    loop {
        let line = match editor.readline("You> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };
        if !line.trim().is_empty() {
            // History is a convenience; failing to record it is not fatal.
            let _ = editor.add_history_entry(line.as_str());
        }

        match session.handle(&line).await {
            Reply::Nothing => {}
            Reply::Answer(answer) => println!("\nAssistant: {answer}\n"),
            Reply::Notice(text) => println!("{text}"),
            Reply::Failure(text) => eprintln!("Error: {text}"),
            Reply::Quit => break,
        }
    }

    info!(turns = session.transcript().turns().len(), "chat session ended");
    println!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use crag_core::{
        EmbeddingProvider, GenerativeProvider, InMemoryVectorStore, Result, Retriever,
    };

    use super::*;

    struct OnesEmbedder;

    #[async_trait]
    impl EmbeddingProvider for OnesEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; 4])
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    /// Numbers its answers; the first `fail_first` calls fail as a 503 would.
    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl CountingGenerator {
        fn failing_first(n: usize) -> Self {
            Self { calls: AtomicUsize::new(0), fail_first: n }
        }
    }

    #[async_trait]
    impl GenerativeProvider for CountingGenerator {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                return Err(RagError::GenerationService {
                    provider: "counting".into(),
                    message: "503 Service Unavailable".into(),
                    retryable: true,
                });
            }
            Ok(format!("answer {n}"))
        }
    }

    async fn engine(generator: Arc<CountingGenerator>, create_index: bool) -> QueryEngine {
        use crag_core::{Metric, VectorStore};
        let store = Arc::new(InMemoryVectorStore::new());
        if create_index {
            store.ensure_index("idx", 4, Metric::Cosine).await.unwrap();
        }
        QueryEngine::new(Retriever::new(Arc::new(OnesEmbedder), store, "idx"), generator)
    }

    #[test]
    fn parses_commands_and_questions() {
        assert_eq!(Input::parse("  ").unwrap(), Input::Empty);
        assert_eq!(Input::parse("/exit").unwrap(), Input::Exit);
        assert_eq!(Input::parse("/history").unwrap(), Input::History);
        assert_eq!(Input::parse("/save out.txt").unwrap(), Input::Save(PathBuf::from("out.txt")));
        assert!(Input::parse("/save").is_err());
        assert!(Input::parse("/frobnicate").is_err());
        assert_eq!(
            Input::parse(" What is Article 14? ").unwrap(),
            Input::Question("What is Article 14?".to_string())
        );
    }

    #[test]
    fn export_pairs_user_with_following_answer() {
        let mut transcript = Transcript::new();
        transcript.record(Role::User, "Q1");
        transcript.record(Role::Assistant, "A1");
        transcript.record(Role::User, "Q2 that failed");
        transcript.record(Role::User, "Q3");
        transcript.record(Role::Assistant, "A3");

        assert_eq!(transcript.qa_pairs(), vec![("Q1", "A1"), ("Q3", "A3")]);
        assert_eq!(transcript.export(), "Q: Q1\nA: A1\n\nQ: Q3\nA: A3");
    }

    #[test]
    fn empty_history_has_placeholder() {
        assert_eq!(Transcript::new().render(), "(no messages yet)");
    }

    #[tokio::test]
    async fn repeated_question_is_not_reasked() {
        let generator = Arc::new(CountingGenerator::default());
        let engine = engine(generator.clone(), true).await;
        let mut session = ChatSession::new(&engine);

        let duties = "What are Fundamental Duties?";
        assert_eq!(session.handle(duties).await, Reply::Answer("answer 1".into()));
        assert!(matches!(session.handle(duties).await, Reply::Notice(_)));
        assert_eq!(session.handle("What is Article 21?").await, Reply::Answer("answer 2".into()));
        assert_eq!(session.handle(duties).await, Reply::Answer("answer 3".into()));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(session.transcript().turns().len(), 6);
    }

    #[tokio::test]
    async fn rephrased_repeat_is_still_a_repeat() {
        let generator = Arc::new(CountingGenerator::default());
        let engine = engine(generator.clone(), true).await;
        let mut session = ChatSession::new(&engine);

        let first = session.handle("What are Fundamental Duties?").await;
        assert_eq!(first, Reply::Answer("answer 1".into()));
        assert!(matches!(session.handle("what are  fundamental duties").await, Reply::Notice(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_question_can_be_asked_again() {
        let generator = Arc::new(CountingGenerator::failing_first(1));
        let engine = engine(generator.clone(), true).await;
        let mut session = ChatSession::new(&engine);

        match session.handle("What is the Panchayati Raj system?").await {
            Reply::Failure(msg) => assert!(msg.contains("try again")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(session.transcript().turns().is_empty());

        assert_eq!(
            session.handle("What is the Panchayati Raj system?").await,
            Reply::Answer("answer 2".into())
        );
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            session.transcript().qa_pairs(),
            vec![("What is the Panchayati Raj system?", "answer 2")]
        );
    }

    #[tokio::test]
    async fn failures_are_reported_and_session_continues() {
        let generator = Arc::new(CountingGenerator::default());
        let engine = engine(generator.clone(), false).await;
        let mut session = ChatSession::new(&engine);

        match session.handle("Who chaired the Drafting Committee?").await {
            Reply::Failure(msg) => assert!(msg.contains("crag init-index")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(session.transcript().turns().is_empty());
        assert!(matches!(session.handle("/history").await, Reply::Notice(_)));
        assert_eq!(session.handle("/exit").await, Reply::Quit);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn save_writes_qa_pairs() {
        let generator = Arc::new(CountingGenerator::default());
        let engine = engine(generator, true).await;
        let mut session = ChatSession::new(&engine);
        session.handle("Q?").await;

        let path = std::env::temp_dir().join(format!("crag-transcript-{}.txt", Uuid::new_v4()));
        let reply = session.handle(&format!("/save {}", path.display())).await;
        assert!(matches!(reply, Reply::Notice(ref msg) if msg.starts_with("Saved 1 Q/A pairs")));

        let saved = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(saved, "Q: Q?\nA: answer 1\n");
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[test]
    fn retryable_failures_get_a_try_again_message() {
        let err = RagError::EmbeddingService {
            provider: "OpenAI".into(),
            message: "429".into(),
            retryable: true,
        };
        assert!(describe_failure(&err).contains("try again"));
    }
}
