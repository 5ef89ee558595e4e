//! Streaming chat session.
//!
//! A session owns its turn history and a backend conversation context.
//! Each send appends the user turn, opens one backend stream and assembles
//! the assistant turn in place as chunks arrive. Greeting and apology turns
//! are local: they are shown but never sent back as context.
//!
//! `send` takes `&mut self`, so a single owner cannot overlap two sends.
//! Shared sessions go through [`crate::sessions::ChatSessions`].

use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::{ChatBackend, ChatContext};
use crate::error::AiError;
use crate::types::{ChatReply, ChatStreamEvent, ChatTurn};

// ============================================================================
// Chat Session Configuration
// ============================================================================

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are Gemini, a helpful, witty, and intelligent \
AI assistant. Keep responses concise and helpful.";
pub const DEFAULT_GREETING: &str =
    "Hello! I'm Gemini, your complete AI assistant. How can I help you today?";
pub const DEFAULT_RESET_GREETING: &str = "Chat cleared. What's next?";
pub const DEFAULT_APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

/// Fixed texts used by every session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSessionConfig {
    pub system_instruction: String,
    /// First turn of a new session.
    pub greeting: String,
    /// Only turn after a reset.
    pub reset_greeting: String,
    /// Appended when a stream fails to open or breaks.
    pub apology: String,
}

impl Default for ChatSessionConfig {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            reset_greeting: DEFAULT_RESET_GREETING.to_string(),
            apology: DEFAULT_APOLOGY.to_string(),
        }
    }
}

// ============================================================================
// Session State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SessionState {
    /// No backend context yet; created on first send.
    Uninitialized,
    #[serde(rename_all = "camelCase")]
    Active { context_id: String },
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionSnapshot {
    pub id: String,
    pub state: SessionState,
    pub system_instruction: String,
    pub turns: Vec<ChatTurn>,
    pub created_at: DateTime<Utc>,
}

fn new_context_id() -> String {
    Uuid::now_v7().to_string()
}

// ============================================================================
// Chat Session
// ============================================================================

pub struct ChatSession<B: ChatBackend + ?Sized> {
    id: String,
    backend: Arc<B>,
    config: Arc<ChatSessionConfig>,
    state: SessionState,
    turns: Vec<ChatTurn>,
    created_at: DateTime<Utc>,
}

impl<B: ChatBackend + ?Sized> ChatSession<B> {
    /// A session with only the greeting turn. The backend context is
    /// created lazily on the first send.
    pub fn new(backend: Arc<B>, config: Arc<ChatSessionConfig>) -> Self {
        let greeting = ChatTurn::local(config.greeting.clone());
        Self {
            id: Uuid::now_v7().to_string(),
            backend,
            config,
            state: SessionState::Uninitialized,
            turns: vec![greeting],
            created_at: Utc::now(),
        }
    }

    /// A session with an active backend context.
    pub fn create(backend: Arc<B>, config: Arc<ChatSessionConfig>) -> Self {
        let mut session = Self::new(backend, config);
        session.activate();
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn snapshot(&self) -> ChatSessionSnapshot {
        ChatSessionSnapshot {
            id: self.id.clone(),
            state: self.state.clone(),
            system_instruction: self.config.system_instruction.clone(),
            turns: self.turns.clone(),
            created_at: self.created_at,
        }
    }

    fn activate(&mut self) -> String {
        if let SessionState::Active { context_id } = &self.state {
            return context_id.clone();
        }
        let context_id = new_context_id();
        info!("Chat session {} opened context {}", self.id, context_id);
        self.state = SessionState::Active {
            context_id: context_id.clone(),
        };
        context_id
    }

    /// Discard every turn and start a fresh backend context.
    pub fn reset(&mut self) {
        let context_id = new_context_id();
        info!("Chat session {} reset to context {}", self.id, context_id);
        self.state = SessionState::Active { context_id };
        self.turns = vec![ChatTurn::local(self.config.reset_greeting.clone())];
    }

    /// Turns sent to the backend as context.
    fn history(&self) -> Vec<ChatTurn> {
        self.turns
            .iter()
            .filter(|turn| !turn.local && !turn.text.trim().is_empty())
            .cloned()
            .collect()
    }

    /// Send a message and stream the reply into the history.
    pub async fn send(&mut self, message: &str) -> Result<ChatReply, AiError> {
        self.send_inner(message, None).await
    }

    /// Like [`send`](Self::send), also forwarding stream events.
    ///
    /// A dropped receiver does not stop the stream; the history is always
    /// settled before this returns.
    pub async fn send_with_events(
        &mut self,
        message: &str,
        events: &mpsc::Sender<ChatStreamEvent>,
    ) -> Result<ChatReply, AiError> {
        self.send_inner(message, Some(events)).await
    }

    async fn send_inner(
        &mut self,
        message: &str,
        events: Option<&mpsc::Sender<ChatStreamEvent>>,
    ) -> Result<ChatReply, AiError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AiError::invalid_input("Message must not be empty"));
        }

        let context = ChatContext {
            context_id: self.activate(),
            system_instruction: self.config.system_instruction.clone(),
            history: self.history(),
        };

        let user_turn = ChatTurn::user(message);
        emit(events, ChatStreamEvent::user_turn(&self.id, &user_turn)).await;
        self.turns.push(user_turn);

        let mut stream = match self.backend.stream_chat(&context, message).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Chat session {} failed to open stream: {}", self.id, e);
                return Ok(self.fail(e, None, events).await);
            }
        };

        let placeholder = ChatTurn::assistant(String::new());
        let turn_id = placeholder.id.clone();
        emit(events, ChatStreamEvent::assistant_started(&self.id, &turn_id)).await;
        self.turns.push(placeholder);
        let index = self.turns.len() - 1;

        let mut accumulated = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    let Some(delta) = chunk.text_delta.filter(|d| !d.is_empty()) else {
                        continue;
                    };
                    accumulated.push_str(&delta);
                    // Overwrite with the accumulated text so the turn is idempotent.
                    self.turns[index].text.clone_from(&accumulated);
                    emit(
                        events,
                        ChatStreamEvent::text_delta(&self.id, &turn_id, &delta, &accumulated),
                    )
                    .await;
                }
                Err(e) => {
                    error!("Chat session {} stream broke: {}", self.id, e);
                    let partial = self.settle_partial(index);
                    return Ok(self.fail(e, partial, events).await);
                }
            }
        }

        if accumulated.is_empty() {
            self.settle_partial(index);
            let e = AiError::empty("the model returned no text");
            return Ok(self.fail(e, None, events).await);
        }

        let turn = self.turns[index].clone();
        debug!(
            "Chat session {} completed turn {} ({} chars)",
            self.id,
            turn.id,
            turn.text.len()
        );
        emit(events, ChatStreamEvent::done(&self.id, &turn)).await;
        Ok(ChatReply::Completed { turn })
    }

    /// Keep a partial assistant turn if it has text, drop it otherwise.
    fn settle_partial(&mut self, index: usize) -> Option<ChatTurn> {
        if self.turns[index].text.is_empty() {
            self.turns.remove(index);
            None
        } else {
            Some(self.turns[index].clone())
        }
    }

    async fn fail(
        &mut self,
        error: AiError,
        partial: Option<ChatTurn>,
        events: Option<&mpsc::Sender<ChatStreamEvent>>,
    ) -> ChatReply {
        let apology = ChatTurn::local(self.config.apology.clone());
        self.turns.push(apology.clone());
        emit(events, ChatStreamEvent::error(&self.id, &error, &apology)).await;
        ChatReply::Failed {
            error: error.to_string(),
            partial,
            apology,
        }
    }
}

async fn emit(events: Option<&mpsc::Sender<ChatStreamEvent>>, event: ChatStreamEvent) {
    if let Some(tx) = events {
        if tx.send(event).await.is_err() {
            debug!("Chat event receiver dropped");
        }
    }
}
