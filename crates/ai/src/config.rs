//! Backend configuration.

use std::time::Duration;

use crate::catalog;
use crate::error::AiError;
use crate::types::ToolKind;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

/// Connection and model settings for the Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    /// REST base including the API version. Used by both tools and chat.
    pub base_url: String,
    /// Model for weather, video, translate, math and recipe.
    pub text_model: String,
    pub image_model: String,
    pub chat_model: String,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            text_model: catalog::default_model(ToolKind::Weather)
                .unwrap_or("gemini-2.5-flash")
                .to_string(),
            image_model: catalog::default_model(ToolKind::Image)
                .unwrap_or("gemini-2.5-flash-image")
                .to_string(),
            chat_model: catalog::default_chat_model().to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

impl GeminiConfig {
    /// Read settings from the process environment.
    ///
    /// The key comes from `GEMINI_API_KEY`, falling back to `API_KEY`. A
    /// missing key is not an error here; the backend reports it per call.
    pub fn from_env() -> Result<Self, AiError> {
        let defaults = Self::default();
        let api_key = env_var("GEMINI_API_KEY").or_else(|| env_var("API_KEY"));
        let timeout_ms = match env_var("OMNI_REQUEST_TIMEOUT_MS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                AiError::Config(format!("Invalid OMNI_REQUEST_TIMEOUT_MS: {}", raw))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };

        Ok(Self {
            api_key,
            base_url: env_var("OMNI_GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            text_model: env_var("OMNI_TEXT_MODEL").unwrap_or(defaults.text_model),
            image_model: env_var("OMNI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            chat_model: env_var("OMNI_CHAT_MODEL").unwrap_or(defaults.chat_model),
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn api_key(&self) -> Result<&str, AiError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AiError::MissingApiKey("gemini".to_string()))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
