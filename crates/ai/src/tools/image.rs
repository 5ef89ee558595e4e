//! Image tool - text-to-image generation returned as a data URI.

use async_trait::async_trait;
use base64::Engine;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ToolExecutor;
use crate::backend::{CompletionBackend, GenerateRequest};
use crate::catalog;
use crate::prompts;
use crate::types::{InlineData, ToolKind, ToolRequest};

pub const NO_IMAGE_GENERATED: &str = "No image generated.";
pub const IMAGE_FAILED: &str = "Failed to generate image.";
pub const IMAGE_MISSING_PROMPT: &str = "Describe the image you want to generate.";

const DEFAULT_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ImageResult {
    #[serde(rename_all = "camelCase")]
    Generated { image_url: String },
    Failed { error: String },
}

impl ImageResult {
    fn failed(error: &str) -> Self {
        Self::Failed {
            error: error.to_string(),
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            Self::Generated { image_url } => Some(image_url),
            Self::Failed { .. } => None,
        }
    }
}

/// Encode inline image bytes as a `data:` URI.
pub fn to_data_uri(inline: &InlineData) -> String {
    let mime = if inline.mime_type.trim().is_empty() {
        DEFAULT_IMAGE_MIME
    } else {
        inline.mime_type.trim()
    };
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(&inline.data)
    )
}

/// Tool to generate an image from a description.
pub struct ImageTool<B: CompletionBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: CompletionBackend + ?Sized> ImageTool<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn generate(&self, description: &str) -> ImageResult {
        let Ok(prompt) = prompts::build_prompt(&ToolRequest::new(ToolKind::Image, description))
        else {
            return ImageResult::failed(IMAGE_MISSING_PROMPT);
        };

        let request = GenerateRequest::image(prompt, catalog::image_aspect_ratio());
        let completion = match self.backend.generate(request).await {
            Ok(completion) => completion,
            Err(e) => {
                error!("Image generation failed: {}", e);
                return ImageResult::failed(IMAGE_FAILED);
            }
        };

        match completion.first_inline_data() {
            Some(inline) => {
                debug!(
                    "Generated {} image ({} bytes)",
                    inline.mime_type,
                    inline.data.len()
                );
                ImageResult::Generated {
                    image_url: to_data_uri(inline),
                }
            }
            None => {
                warn!("Image response had no inline data");
                ImageResult::failed(NO_IMAGE_GENERATED)
            }
        }
    }
}

impl<B: CompletionBackend + ?Sized> Clone for ImageTool<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

#[async_trait]
impl<B: CompletionBackend + ?Sized> ToolExecutor for ImageTool<B> {
    const KIND: ToolKind = ToolKind::Image;

    type Output = ImageResult;

    async fn execute(&self, request: &ToolRequest) -> ImageResult {
        self.generate(&request.input).await
    }
}
