//! Backend abstraction.
//!
//! The model is an opaque collaborator reached in two shapes: a single
//! request/response call for tools, and a per-message token stream for chat.
//! `GeminiBackend` implements both against Google's API; `FakeBackend`
//! replays scripted answers in tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::AiError;
use crate::types::{ChatTurn, RawCompletion};

// ============================================================================
// Completion Requests
// ============================================================================

/// How the backend should answer a one-shot request.
///
/// Web grounding and structured output can't be combined, so they are
/// separate variants rather than two flags.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationMode {
    /// Free text, no extra constraints.
    Plain,
    /// JSON output, optionally constrained by a `responseSchema`.
    Structured { schema: Option<Value> },
    /// Free text backed by Google Search, with grounding metadata.
    Grounded,
    /// Image output.
    Image { aspect_ratio: String },
}

/// A one-shot completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub mode: GenerationMode,
    /// Overrides the backend's default model for this mode.
    pub model: Option<String>,
}

impl GenerateRequest {
    pub fn plain(prompt: impl Into<String>) -> Self {
        Self::with_mode(prompt, GenerationMode::Plain)
    }

    pub fn structured(prompt: impl Into<String>, schema: Option<Value>) -> Self {
        Self::with_mode(prompt, GenerationMode::Structured { schema })
    }

    pub fn grounded(prompt: impl Into<String>) -> Self {
        Self::with_mode(prompt, GenerationMode::Grounded)
    }

    pub fn image(prompt: impl Into<String>, aspect_ratio: impl Into<String>) -> Self {
        Self::with_mode(
            prompt,
            GenerationMode::Image {
                aspect_ratio: aspect_ratio.into(),
            },
        )
    }

    fn with_mode(prompt: impl Into<String>, mode: GenerationMode) -> Self {
        Self {
            prompt: prompt.into(),
            mode,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// One-shot completion backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<RawCompletion, AiError>;
}

// ============================================================================
// Chat Streaming
// ============================================================================

/// Conversation context sent with every chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatContext {
    pub context_id: String,
    pub system_instruction: String,
    /// Prior turns, oldest first, local turns excluded.
    pub history: Vec<ChatTurn>,
}

/// One streamed chat chunk. Chunks without text are skipped by consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatChunk {
    pub text_delta: Option<String>,
}

impl ChatChunk {
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            text_delta: Some(delta.into()),
        }
    }
}

/// Finite, non-restartable stream of chunks for one message.
pub type ChatChunkStream = BoxStream<'static, Result<ChatChunk, AiError>>;

/// Streaming chat backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Open a stream for `message`. Errors here mean the stream never opened.
    async fn stream_chat(
        &self,
        context: &ChatContext,
        message: &str,
    ) -> Result<ChatChunkStream, AiError>;
}
