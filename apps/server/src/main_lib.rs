use std::sync::Arc;

use crate::config::Config;
use omnitool_ai::{
    ChatBackend, ChatSessionConfig, ChatSessions, CompletionBackend, GeminiBackend, ToolSet,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub struct AppState {
    pub tools: ToolSet<dyn CompletionBackend>,
    pub chat_sessions: ChatSessions<dyn ChatBackend>,
}

pub fn init_tracing() {
    let log_format = std::env::var("OMNI_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    if config.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; tool and chat calls will fail");
    }
    tracing::info!(
        "Using Gemini at {} (text: {}, image: {}, chat: {})",
        config.gemini.base_url,
        config.gemini.text_model,
        config.gemini.image_model,
        config.gemini.chat_model
    );

    let backend = Arc::new(GeminiBackend::new(config.gemini.clone())?);
    Ok(build_state_with(backend.clone(), backend, config))
}

/// Wire the state around arbitrary backends.
pub fn build_state_with(
    completion: Arc<dyn CompletionBackend>,
    chat: Arc<dyn ChatBackend>,
    config: &Config,
) -> Arc<AppState> {
    Arc::new(AppState {
        tools: ToolSet::new(completion),
        chat_sessions: ChatSessions::new(chat, ChatSessionConfig::default())
            .with_limits(config.max_chat_sessions, config.chat_idle_ttl),
    })
}
