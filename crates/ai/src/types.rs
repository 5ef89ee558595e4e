//! Shared types for the normalization layer.
//!
//! This module defines the types that cross component boundaries:
//! - Request types: ToolKind, ToolRequest
//! - Backend output: RawCompletion, CandidatePart, InlineData, GroundingChunk
//! - Chat types: ChatRole, ChatTurn, ChatStreamEvent, ChatReply

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AiError;

// ============================================================================
// Tool Requests
// ============================================================================

/// The tools exposed by OmniTool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Weather,
    Video,
    Translate,
    Math,
    Recipe,
    Image,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::Weather,
        ToolKind::Video,
        ToolKind::Translate,
        ToolKind::Math,
        ToolKind::Recipe,
        ToolKind::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Weather => "weather",
            ToolKind::Video => "video",
            ToolKind::Translate => "translate",
            ToolKind::Math => "math",
            ToolKind::Recipe => "recipe",
            ToolKind::Image => "image",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AiError::invalid_input(format!("Unknown tool: {}", s)))
    }
}

/// A single user action against one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRequest {
    pub kind: ToolKind,
    pub input: String,
    /// Only meaningful for `translate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
}

impl ToolRequest {
    pub fn new(kind: ToolKind, input: impl Into<String>) -> Self {
        Self {
            kind,
            input: input.into(),
            target_language: None,
        }
    }

    pub fn translate(text: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            kind: ToolKind::Translate,
            input: text.into(),
            target_language: Some(target_language.into()),
        }
    }
}

// ============================================================================
// Backend Output
// ============================================================================

/// A web citation attached to a grounded completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingChunk {
    /// Empty when the backend returned a chunk without a web source.
    #[serde(default)]
    pub source_uri: String,
    #[serde(default)]
    pub source_title: String,
}

impl GroundingChunk {
    pub fn new(source_uri: impl Into<String>, source_title: impl Into<String>) -> Self {
        Self {
            source_uri: source_uri.into(),
            source_title: source_title.into(),
        }
    }
}

/// Decoded inline binary content of a candidate part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineData {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// One part of the first completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidatePart {
    Text(String),
    InlineData(InlineData),
}

/// A completed, non-streamed backend response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCompletion {
    /// Concatenated text of the first candidate.
    pub text: String,
    pub parts: Vec<CandidatePart>,
    pub grounding_chunks: Vec<GroundingChunk>,
}

impl RawCompletion {
    /// A text-only completion.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            parts: vec![CandidatePart::Text(text.clone())],
            text,
            grounding_chunks: Vec::new(),
        }
    }

    pub fn with_grounding(mut self, chunks: Vec<GroundingChunk>) -> Self {
        self.grounding_chunks = chunks;
        self
    }

    pub fn with_inline_data(mut self, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.parts.push(CandidatePart::InlineData(InlineData {
            mime_type: mime_type.into(),
            data,
        }));
        self
    }

    /// First non-empty inline binary part, in candidate order.
    pub fn first_inline_data(&self) -> Option<&InlineData> {
        self.parts.iter().find_map(|part| match part {
            CandidatePart::InlineData(inline) if !inline.data.is_empty() => Some(inline),
            _ => None,
        })
    }
}

// ============================================================================
// Chat Types
// ============================================================================

/// Chat turn role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    #[serde(alias = "model")]
    Assistant,
}

/// One entry of a chat session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    /// Time-ordered id (UUID v7), unique per turn.
    pub id: String,
    pub role: ChatRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Greeting and apology turns are shown to the user but never sent as context.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub local: bool,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::build(ChatRole::User, text.into(), false)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::build(ChatRole::Assistant, text.into(), false)
    }

    /// An assistant turn generated locally (greeting, apology).
    pub fn local(text: impl Into<String>) -> Self {
        Self::build(ChatRole::Assistant, text.into(), true)
    }

    fn build(role: ChatRole, text: String, local: bool) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            role,
            text,
            created_at: Utc::now(),
            local,
        }
    }
}

/// Events emitted while a chat message streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatStreamEvent {
    /// The user turn was appended (sent first).
    #[serde(rename_all = "camelCase")]
    UserTurn { session_id: String, turn: ChatTurn },

    /// The assistant placeholder turn was appended.
    #[serde(rename_all = "camelCase")]
    AssistantStarted { session_id: String, turn_id: String },

    /// A chunk arrived. `text` is the full accumulated text so far.
    #[serde(rename_all = "camelCase")]
    TextDelta {
        session_id: String,
        turn_id: String,
        delta: String,
        text: String,
    },

    /// The stream failed; the apology turn was appended (terminal).
    #[serde(rename_all = "camelCase")]
    Error {
        session_id: String,
        code: String,
        message: String,
        apology: ChatTurn,
    },

    /// The assistant turn is complete (terminal).
    #[serde(rename_all = "camelCase")]
    Done { session_id: String, turn: ChatTurn },
}

impl ChatStreamEvent {
    pub fn user_turn(session_id: &str, turn: &ChatTurn) -> Self {
        Self::UserTurn {
            session_id: session_id.to_string(),
            turn: turn.clone(),
        }
    }

    pub fn assistant_started(session_id: &str, turn_id: &str) -> Self {
        Self::AssistantStarted {
            session_id: session_id.to_string(),
            turn_id: turn_id.to_string(),
        }
    }

    pub fn text_delta(session_id: &str, turn_id: &str, delta: &str, text: &str) -> Self {
        Self::TextDelta {
            session_id: session_id.to_string(),
            turn_id: turn_id.to_string(),
            delta: delta.to_string(),
            text: text.to_string(),
        }
    }

    pub fn error(session_id: &str, error: &AiError, apology: &ChatTurn) -> Self {
        Self::Error {
            session_id: session_id.to_string(),
            code: error.code().to_string(),
            message: error.to_string(),
            apology: apology.clone(),
        }
    }

    pub fn done(session_id: &str, turn: &ChatTurn) -> Self {
        Self::Done {
            session_id: session_id.to_string(),
            turn: turn.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done { .. })
    }
}

/// Outcome of one chat send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ChatReply {
    /// The assistant turn streamed to completion.
    Completed { turn: ChatTurn },

    /// The stream could not be opened or broke midway.
    #[serde(rename_all = "camelCase")]
    Failed {
        error: String,
        /// Partial assistant turn kept in the history, if any text arrived.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial: Option<ChatTurn>,
        apology: ChatTurn,
    },
}

impl ChatReply {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_kind_parses_case_insensitively() {
        assert_eq!("Weather".parse::<ToolKind>().unwrap(), ToolKind::Weather);
        assert_eq!(" image ".parse::<ToolKind>().unwrap(), ToolKind::Image);
        assert!(matches!(
            "stocks".parse::<ToolKind>(),
            Err(AiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_tool_request_wire_format() {
        let request: ToolRequest = serde_json::from_str(
            r#"{"kind":"translate","input":"hola","targetLanguage":"English"}"#,
        )
        .unwrap();
        assert_eq!(request, ToolRequest::translate("hola", "English"));

        let json = serde_json::to_value(ToolRequest::new(ToolKind::Math, "2+2")).unwrap();
        assert!(json.get("targetLanguage").is_none());
    }

    #[test]
    fn test_first_inline_data_skips_text_parts() {
        let completion = RawCompletion::text("here you go")
            .with_inline_data("image/png", vec![1, 2, 3])
            .with_inline_data("image/jpeg", vec![4]);

        let inline = completion.first_inline_data().unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, vec![1, 2, 3]);
        assert!(RawCompletion::text("nothing").first_inline_data().is_none());
    }

    #[test]
    fn test_chat_turn_ids_are_unique() {
        let a = ChatTurn::user("a");
        let b = ChatTurn::user("a");
        assert_ne!(a.id, b.id);
        assert!(!a.local);
        assert!(ChatTurn::local("hi").local);
    }

    #[test]
    fn test_local_flag_omitted_for_regular_turns() {
        let json = serde_json::to_value(ChatTurn::assistant("hi")).unwrap();
        assert!(json.get("local").is_none());
        assert_eq!(json["role"], "assistant");

        let json = serde_json::to_value(ChatTurn::local("hi")).unwrap();
        assert_eq!(json["local"], true);
    }

    #[test]
    fn test_model_role_alias() {
        let role: ChatRole = serde_json::from_str("\"model\"").unwrap();
        assert_eq!(role, ChatRole::Assistant);
    }

    #[test]
    fn test_stream_event_tagging() {
        let event = ChatStreamEvent::text_delta("s1", "t1", "lo", "Hello");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "textDelta");
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["text"], "Hello");
        assert!(!event.is_terminal());
        assert!(ChatStreamEvent::done("s1", &ChatTurn::assistant("x")).is_terminal());
    }
}
