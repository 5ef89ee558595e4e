//! Tool request executors.
//!
//! One executor per tool:
//! - WeatherTool: grounded weather lookup with forecast
//! - VideoTool: grounded YouTube metadata lookup
//! - TranslateTool: structured translation with language detection
//! - MathTool: structured step-by-step solutions
//! - RecipeTool: structured recipe generation
//! - ImageTool: image generation returned as a data URI
//!
//! Executors never return errors. Backend and parse failures are logged and
//! turned into the tool's failure variant so callers always get a definite
//! result to render.

pub mod image;
pub mod math;
pub mod recipe;
pub mod translate;
pub mod video;
pub mod weather;

pub use image::{ImageResult, ImageTool};
pub use math::{MathData, MathResult, MathTool};
pub use recipe::{RecipeData, RecipeResult, RecipeTool};
pub use translate::{TranslateTool, Translation, TranslationResult};
pub use video::{extract_video_id, VideoData, VideoMetadata, VideoResult, VideoTool};
pub use weather::{CurrentWeather, ForecastDay, WeatherData, WeatherResult, WeatherTool};

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::backend::CompletionBackend;
use crate::types::{ToolKind, ToolRequest};

/// A tool that turns a request into a typed, always-present result.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    const KIND: ToolKind;

    type Output: Serialize + Send;

    async fn execute(&self, request: &ToolRequest) -> Self::Output;
}

/// Result of any tool, tagged by tool kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "result", rename_all = "lowercase")]
pub enum ToolResult {
    Weather(WeatherResult),
    Video(VideoResult),
    Translate(TranslationResult),
    Math(MathResult),
    Recipe(RecipeResult),
    Image(ImageResult),
}

impl ToolResult {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolResult::Weather(_) => ToolKind::Weather,
            ToolResult::Video(_) => ToolKind::Video,
            ToolResult::Translate(_) => ToolKind::Translate,
            ToolResult::Math(_) => ToolKind::Math,
            ToolResult::Recipe(_) => ToolKind::Recipe,
            ToolResult::Image(_) => ToolKind::Image,
        }
    }

    /// Whether the tool produced its full structured payload.
    pub fn is_success(&self) -> bool {
        match self {
            ToolResult::Weather(r) => r.data().is_some(),
            ToolResult::Video(r) => matches!(r, VideoResult::Metadata { .. }),
            ToolResult::Translate(r) => r.data().is_some(),
            ToolResult::Math(r) => r.data().is_some(),
            ToolResult::Recipe(r) => r.data().is_some(),
            ToolResult::Image(r) => r.image_url().is_some(),
        }
    }
}

/// Container for all tools sharing one backend.
pub struct ToolSet<B: CompletionBackend + ?Sized> {
    pub weather: WeatherTool<B>,
    pub video: VideoTool<B>,
    pub translate: TranslateTool<B>,
    pub math: MathTool<B>,
    pub recipe: RecipeTool<B>,
    pub image: ImageTool<B>,
}

impl<B: CompletionBackend + ?Sized> ToolSet<B> {
    /// Create a new tool set with every tool.
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            weather: WeatherTool::new(backend.clone()),
            video: VideoTool::new(backend.clone()),
            translate: TranslateTool::new(backend.clone()),
            math: MathTool::new(backend.clone()),
            recipe: RecipeTool::new(backend.clone()),
            image: ImageTool::new(backend),
        }
    }

    /// Dispatch a request to the tool it names.
    pub async fn run(&self, request: &ToolRequest) -> ToolResult {
        debug!("Running {} tool", request.kind);
        match request.kind {
            ToolKind::Weather => ToolResult::Weather(self.weather.execute(request).await),
            ToolKind::Video => ToolResult::Video(self.video.execute(request).await),
            ToolKind::Translate => ToolResult::Translate(self.translate.execute(request).await),
            ToolKind::Math => ToolResult::Math(self.math.execute(request).await),
            ToolKind::Recipe => ToolResult::Recipe(self.recipe.execute(request).await),
            ToolKind::Image => ToolResult::Image(self.image.execute(request).await),
        }
    }
}

/// Accept a JSON string or number as a string. Models are inconsistent
/// about fields like view counts and calories.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBackend;
    use serde_json::json;

    #[tokio::test]
    async fn test_run_dispatches_by_kind() {
        let backend = Arc::new(FakeBackend::new().with_text(
            r#"{"topic":"Algebra","result":"x = 4","steps":["Subtract 3","Divide by 2"]}"#,
        ));
        let tools = ToolSet::new(backend.clone());

        let result = tools
            .run(&ToolRequest::new(ToolKind::Math, "2x + 3 = 11"))
            .await;

        assert_eq!(result.kind(), ToolKind::Math);
        assert!(result.is_success());
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_every_tool_yields_a_result_when_backend_is_down() {
        let backend = Arc::new(FakeBackend::new());
        let tools = ToolSet::new(backend);

        for kind in ToolKind::ALL {
            let input = match kind {
                ToolKind::Video => "dQw4w9WgXcQ",
                _ => "anything",
            };
            let result = tools.run(&ToolRequest::new(kind, input)).await;
            assert_eq!(result.kind(), kind);
            assert!(!result.is_success(), "{} should fail", kind);
        }
    }

    #[tokio::test]
    async fn test_executors_send_the_built_prompt() {
        let backend = Arc::new(FakeBackend::new());
        let tools = ToolSet::new(backend.clone());
        let requests: Vec<ToolRequest> = ToolKind::ALL
            .into_iter()
            .map(|kind| match kind {
                ToolKind::Video => ToolRequest::new(kind, "https://youtu.be/dQw4w9WgXcQ"),
                ToolKind::Translate => ToolRequest::translate("Good night", "Italian"),
                _ => ToolRequest::new(kind, "  something  "),
            })
            .collect();

        for request in &requests {
            tools.run(request).await;
        }

        let sent = backend.requests();
        assert_eq!(sent.len(), requests.len());
        for (request, generated) in requests.iter().zip(&sent) {
            assert_eq!(
                generated.prompt,
                crate::prompts::build_prompt(request).unwrap(),
                "{} prompt",
                request.kind
            );
        }
    }

    #[tokio::test]
    async fn test_blank_input_never_reaches_backend() {
        let backend = Arc::new(FakeBackend::new());
        let tools = ToolSet::new(backend.clone());

        for kind in ToolKind::ALL {
            let result = tools.run(&ToolRequest::new(kind, " \n ")).await;
            assert!(!result.is_success());
        }
        assert!(backend.requests().is_empty());
    }

    #[test]
    fn test_tool_result_wire_format() {
        let result = ToolResult::Image(ImageResult::Failed {
            error: "No image generated.".to_string(),
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            json!({
                "tool": "image",
                "result": { "status": "failed", "error": "No image generated." }
            })
        );
    }

    #[derive(Debug, Deserialize)]
    struct Views {
        #[serde(deserialize_with = "string_or_number")]
        views: String,
    }

    #[test]
    fn test_string_or_number() {
        let v: Views = serde_json::from_value(json!({ "views": 1200 })).unwrap();
        assert_eq!(v.views, "1200");
        let v: Views = serde_json::from_value(json!({ "views": "1.2M" })).unwrap();
        assert_eq!(v.views, "1.2M");
        assert!(serde_json::from_value::<Views>(json!({ "views": [1] })).is_err());
    }
}
