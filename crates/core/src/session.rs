//! Interactive question loop: retrieve, compose, generate, respond.

use crate::chat::ChatModel;
use crate::config::Settings;
use crate::context::{citation, format_context};
use crate::embeddings::Embedder;
use crate::history::ConversationHistory;
use crate::prompt::build_messages;
use crate::traits::VectorIndex;
use crate::{Answer, BackendError, RetrievedChunk, SessionError};
use std::fmt;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Retrieving,
    Composing,
    Generating,
    Responding,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Retrieving => "retrieving",
            Self::Composing => "composing",
            Self::Generating => "generating",
            Self::Responding => "responding",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

pub struct QuerySession<'a, E: ?Sized, V: ?Sized, C: ?Sized> {
    embedder: &'a E,
    index: &'a V,
    chat: &'a C,
    collection: String,
    top_k: usize,
    history: Option<ConversationHistory>,
    state: SessionState,
}

impl<'a, E, V, C> QuerySession<'a, E, V, C>
where
    E: Embedder + ?Sized,
    V: VectorIndex + ?Sized,
    C: ChatModel + ?Sized,
{
    pub fn new(settings: &Settings, embedder: &'a E, index: &'a V, chat: &'a C) -> Self {
        Self {
            embedder,
            index,
            chat,
            collection: settings.collection.clone(),
            top_k: settings.top_k,
            history: settings
                .history
                .then(|| ConversationHistory::new(settings.history_max_turns)),
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> Option<&ConversationHistory> {
        self.history.as_ref()
    }

    fn enter(&mut self, state: SessionState) {
        debug!(from = %self.state, to = %state, "session state");
        self.state = state;
    }

    /// Top-K chunks for `question` in similarity order.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, BackendError> {
        let query_vector = self.embedder.embed(question).await?;
        self.index.search(&query_vector, self.top_k).await
    }

    /// Answers one question. A collaborator failure ends the turn with an
    /// error and leaves history untouched.
    pub async fn answer(&mut self, question: &str) -> Result<Answer, BackendError> {
        self.enter(SessionState::Retrieving);
        let sources = self.retrieve(question).await?;
        info!(retrieved = sources.len(), top_k = self.top_k, "retrieved chunks");

        self.enter(SessionState::Composing);
        let context = format_context(&sources);
        let messages = build_messages(self.history.as_ref(), question, &context);

        self.enter(SessionState::Generating);
        let text = self.chat.complete(&messages).await?;

        self.enter(SessionState::Responding);
        if let Some(history) = self.history.as_mut() {
            history.record_turn(question, text.clone());
        }

        Ok(Answer {
            question: question.to_string(),
            text,
            sources,
        })
    }

    /// Reads questions line by line until an empty line or end of input.
    /// Returns how many questions were answered.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> Result<usize, SessionError>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        writeln!(output, "Connected to collection: {}", self.collection)?;
        writeln!(output, "Ask a question (empty line to quit)\n")?;

        let mut lines = input.lines();
        let mut answered = 0usize;

        loop {
            self.enter(SessionState::Idle);
            write!(output, "Q: ")?;
            output.flush()?;

            let question = match lines.next_line().await? {
                Some(line) => line.trim().to_string(),
                None => String::new(),
            };
            if question.is_empty() {
                break;
            }

            let answer = self.answer(&question).await?;
            write_answer(output, &answer)?;
            answered += 1;
        }

        self.enter(SessionState::Stopped);
        writeln!(output)?;
        Ok(answered)
    }
}

pub fn write_answer<W: Write>(output: &mut W, answer: &Answer) -> std::io::Result<()> {
    writeln!(output, "\nA: {}\n", answer.text)?;
    if !answer.sources.is_empty() {
        writeln!(output, "Retrieved excerpts:")?;
        for (position, chunk) in answer.sources.iter().enumerate() {
            writeln!(output, "  {}", citation(position + 1, chunk))?;
        }
        writeln!(output)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::{ChatMessage, Role, RuleChunk};
    use crate::prompt::SYSTEM_INSTRUCTIONS;
    use crate::stores::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const DISCLAIMER: &str = "I cannot find it in the rules excerpts.";

    /// Answers from the context when it mentions `keyword`, otherwise
    /// declines the way the system instructions require.
    struct GroundedChat {
        keyword: &'static str,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl GroundedChat {
        fn new(keyword: &'static str) -> Self {
            Self {
                keyword,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<ChatMessage>> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChatModel for GroundedChat {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(messages.to_vec());
            }
            let grounded = messages[0].content == SYSTEM_INSTRUCTIONS;
            let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
            let context = prompt.split("Context excerpts:").nth(1).unwrap_or_default();
            if grounded && context.contains(self.keyword) {
                Ok(format!("Found {} in the rules. Sources: [1]", self.keyword))
            } else {
                Ok(DISCLAIMER.to_string())
            }
        }
    }

    struct FailingChat;

    #[async_trait]
    impl ChatModel for FailingChat {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, BackendError> {
            Err(BackendError::Request("quota exceeded".to_string()))
        }
    }

    async fn seeded_store(texts: &[&str]) -> InMemoryStore {
        let embedder = CharacterNgramEmbedder::default();
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(index, text)| RuleChunk {
                chunk_id: format!("chunk-{index}"),
                chunk_index: index as u64,
                source_name: "rules.pdf".to_string(),
                source_path: "data/rules/rules.pdf".to_string(),
                page: Some(index as u32),
                text: text.to_string(),
            })
            .collect::<Vec<_>>();
        let vectors = chunks
            .iter()
            .map(|chunk| embedder.embed_sync(&chunk.text))
            .collect::<Vec<_>>();
        let store = InMemoryStore::new();
        store
            .upsert_chunks(&chunks, &vectors)
            .await
            .expect("seed store");
        store
    }

    fn settings(top_k: usize, history: bool) -> Settings {
        Settings {
            top_k,
            history,
            ..Settings::default()
        }
    }

    const RULES: [&str; 5] = [
        "Each player starts the game with five cards.",
        "The robber moves when a seven is rolled.",
        "Settlements must be two roads apart.",
        "Cities produce two resources.",
        "The longest road is worth two victory points.",
    ];

    #[tokio::test]
    async fn top_k_limits_retrieved_citations() {
        let store = seeded_store(&RULES).await;
        let embedder = CharacterNgramEmbedder::default();
        let chat = GroundedChat::new("robber");
        let mut session = QuerySession::new(&settings(2, false), &embedder, &store, &chat);

        let answer = session
            .answer("What happens when a seven is rolled?")
            .await
            .expect("answer");

        assert_eq!(answer.sources.len(), 2);
        let calls = chat.calls();
        let prompt = &calls[0][1].content;
        assert!(prompt.contains("[1] Source: rules.pdf"));
        assert!(prompt.contains("[2] Source: rules.pdf"));
        assert!(!prompt.contains("[3]"));
        assert_eq!(session.state(), SessionState::Responding);
    }

    #[tokio::test]
    async fn missing_answer_yields_disclaimer() {
        let store = seeded_store(&RULES).await;
        let embedder = CharacterNgramEmbedder::default();
        let chat = GroundedChat::new("auction");
        let mut session = QuerySession::new(&settings(5, false), &embedder, &store, &chat);

        let answer = session.answer("How does the auction work?").await.expect("answer");
        assert!(answer.text.contains("cannot find it"));
    }

    #[tokio::test]
    async fn loop_stops_on_empty_line_and_prints_answers() {
        let store = seeded_store(&RULES).await;
        let embedder = CharacterNgramEmbedder::default();
        let chat = GroundedChat::new("cards");
        let mut session = QuerySession::new(&settings(5, false), &embedder, &store, &chat);
        let input: &[u8] = b"How many cards do players start with?\n\nIgnored question\n";
        let mut output = Vec::new();

        let answered = session.run(input, &mut output).await.expect("run");
        let transcript = String::from_utf8(output).expect("utf8");

        assert_eq!(answered, 1);
        assert_eq!(chat.calls().len(), 1);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(transcript.starts_with("Connected to collection: boardgame_rules_v0"));
        assert!(transcript.contains("A: Found cards in the rules. Sources: [1]"));
        assert!(transcript.contains("  [1] Source: rules.pdf (p. "));
        assert!(transcript.contains("  [5] Source: rules.pdf (p. "));
        assert!(!transcript.contains("Ignored question"));
    }

    #[tokio::test]
    async fn end_of_input_stops_the_loop() {
        let store = seeded_store(&RULES).await;
        let embedder = CharacterNgramEmbedder::default();
        let chat = GroundedChat::new("cards");
        let mut session = QuerySession::new(&settings(3, false), &embedder, &store, &chat);
        let input: &[u8] = b"";
        let mut output = Vec::new();

        let answered = session.run(input, &mut output).await.expect("run");
        assert_eq!(answered, 0);
        assert!(chat.calls().is_empty());
    }

    #[tokio::test]
    async fn history_is_replayed_on_later_turns() {
        let store = seeded_store(&RULES).await;
        let embedder = CharacterNgramEmbedder::default();
        let chat = GroundedChat::new("road");
        let mut session = QuerySession::new(&settings(2, true), &embedder, &store, &chat);

        session.answer("How far apart are settlements?").await.expect("first");
        session.answer("And cities?").await.expect("second");

        let calls = chat.calls();
        assert_eq!(calls[0].len(), 2);
        let roles = calls[1].iter().map(|message| message.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(calls[1][1].content, "How far apart are settlements?");
        assert_eq!(session.history().map(ConversationHistory::len), Some(2));
    }

    #[tokio::test]
    async fn without_history_each_turn_stands_alone() {
        let store = seeded_store(&RULES).await;
        let embedder = CharacterNgramEmbedder::default();
        let chat = GroundedChat::new("road");
        let mut session = QuerySession::new(&settings(2, false), &embedder, &store, &chat);

        session.answer("First?").await.expect("first");
        session.answer("Second?").await.expect("second");

        assert_eq!(chat.calls()[1].len(), 2);
        assert!(session.history().is_none());
    }

    #[tokio::test]
    async fn chat_failure_ends_the_session() {
        let store = seeded_store(&RULES).await;
        let embedder = CharacterNgramEmbedder::default();
        let mut session = QuerySession::new(&settings(2, true), &embedder, &store, &FailingChat);
        let input: &[u8] = b"Who goes first?\n";
        let mut output = Vec::new();

        let result = session.run(input, &mut output).await;
        assert!(matches!(result, Err(SessionError::Backend(_))));
        assert_eq!(session.history().map(ConversationHistory::len), Some(0));
    }
}
