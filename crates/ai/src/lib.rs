//! OmniTool AI - response normalization over Gemini.
//!
//! This crate turns free-form model completions (fenced, streamed,
//! incomplete or failed) into typed results for a set of tools, and keeps
//! conversational state for streaming chat.
//!
//! # Architecture
//!
//! - `prompts`: Instruction + JSON schema description per tool
//! - `extract`: Fence stripping and lenient JSON extraction
//! - `tools`: Weather, video, translate, math, recipe and image executors
//! - `chat`: Streaming chat session with incremental turn assembly
//! - `sessions`: Registry of shared sessions with single-flight sends
//! - `grounding`: Web citations from grounded completions
//! - `backend`: Completion and chat backend traits
//! - `gemini`: Gemini implementation (REST for tools, rig-core for chat)
//! - `fake`: Scripted backend for tests
//! - `catalog`: Embedded tool catalog and translation languages
//! - `config`: Backend configuration from the environment
//!
//! # Example
//!
//! ```ignore
//! use omnitool_ai::{GeminiBackend, GeminiConfig, ToolKind, ToolRequest, ToolSet};
//!
//! let backend = Arc::new(GeminiBackend::new(GeminiConfig::from_env()?)?);
//! let tools = ToolSet::new(backend.clone());
//!
//! match tools.run(&ToolRequest::new(ToolKind::Math, "2x + 3 = 11")).await {
//!     ToolResult::Math(MathResult::Solved { data }) => println!("{}", data.result),
//!     other => println!("{:?}", other),
//! }
//!
//! let mut chat = ChatSession::create(backend, Arc::new(ChatSessionConfig::default()));
//! chat.send("Tell me a joke").await?;
//! ```

pub mod backend;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod error;
pub mod extract;
pub mod fake;
pub mod gemini;
pub mod grounding;
pub mod prompts;
pub mod sessions;
pub mod tools;
pub mod types;

// Re-export main types for convenience
pub use backend::{
    ChatBackend, ChatChunk, ChatChunkStream, ChatContext, CompletionBackend, GenerateRequest,
    GenerationMode,
};
pub use catalog::{CatalogResponse, ToolInfo};
pub use chat::{ChatSession, ChatSessionConfig, ChatSessionSnapshot, SessionState};
pub use config::GeminiConfig;
pub use error::AiError;
pub use extract::{extract_as, extract_json, strip_fences, Extraction};
pub use fake::{FakeBackend, FakeStream};
pub use gemini::GeminiBackend;
pub use grounding::{grounding_chunks, web_sources};
pub use prompts::build_prompt;
pub use sessions::{ChatSessions, SessionGuard};
pub use tools::{
    CurrentWeather, ForecastDay, ImageResult, ImageTool, MathData, MathResult, MathTool,
    RecipeData, RecipeResult, RecipeTool, ToolExecutor, ToolResult, ToolSet, TranslateTool,
    Translation, TranslationResult, VideoData, VideoMetadata, VideoResult, VideoTool,
    WeatherData, WeatherResult, WeatherTool,
};
pub use types::{
    CandidatePart, ChatReply, ChatRole, ChatStreamEvent, ChatTurn, GroundingChunk, InlineData,
    RawCompletion, ToolKind, ToolRequest,
};
