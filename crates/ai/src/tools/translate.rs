//! Translate tool - translation with source language detection.

use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ToolExecutor;
use crate::backend::{CompletionBackend, GenerateRequest};
use crate::extract::extract_as;
use crate::prompts::{self, TRANSLATION_FIELDS};
use crate::types::{ToolKind, ToolRequest};

pub const TRANSLATION_ERROR: &str = "Error translating.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub translated_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
}

/// Translation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TranslationResult {
    Translated { data: Translation },
    Failed { error: String },
}

impl TranslationResult {
    fn failed() -> Self {
        Self::Failed {
            error: TRANSLATION_ERROR.to_string(),
        }
    }

    pub fn data(&self) -> Option<&Translation> {
        match self {
            Self::Translated { data } => Some(data),
            Self::Failed { .. } => None,
        }
    }

    /// Text to display: the translation or the error message.
    pub fn display_text(&self) -> &str {
        match self {
            Self::Translated { data } => &data.translated_text,
            Self::Failed { error } => error,
        }
    }
}

/// Tool to translate text into a target language.
pub struct TranslateTool<B: CompletionBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: CompletionBackend + ?Sized> TranslateTool<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn translate(&self, text: &str, target_language: &str) -> TranslationResult {
        self.run(&ToolRequest::translate(text, target_language)).await
    }

    /// Blank targets fall back to the catalog default language.
    async fn run(&self, request: &ToolRequest) -> TranslationResult {
        let prompt = match prompts::build_prompt(request) {
            Ok(prompt) => prompt,
            Err(e) => {
                debug!("Translation request rejected: {}", e);
                return TranslationResult::failed();
            }
        };
        let target_language = prompts::target_language(request);

        let request = GenerateRequest::structured(
            prompt,
            Some(prompts::response_schema(TRANSLATION_FIELDS)),
        );

        let completion = match self.backend.generate(request).await {
            Ok(completion) => completion,
            Err(e) => {
                error!("Translation to {} failed: {}", target_language, e);
                return TranslationResult::failed();
            }
        };

        match extract_as::<Translation>(&completion.text) {
            Ok(data) if !data.translated_text.trim().is_empty() => {
                debug!(
                    "Translated {:?} -> {}",
                    data.detected_language.as_deref().unwrap_or("unknown"),
                    target_language
                );
                TranslationResult::Translated { data }
            }
            Ok(_) => {
                error!("Translation to {} came back empty", target_language);
                TranslationResult::failed()
            }
            Err(e) => {
                error!("Translation payload rejected: {}", e);
                TranslationResult::failed()
            }
        }
    }
}

impl<B: CompletionBackend + ?Sized> Clone for TranslateTool<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

#[async_trait]
impl<B: CompletionBackend + ?Sized> ToolExecutor for TranslateTool<B> {
    const KIND: ToolKind = ToolKind::Translate;

    type Output = TranslationResult;

    async fn execute(&self, request: &ToolRequest) -> TranslationResult {
        self.run(request).await
    }
}
