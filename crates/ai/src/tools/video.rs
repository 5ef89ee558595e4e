//! Video tool - YouTube metadata lookup via a grounded call.
//!
//! The video id, thumbnail and links are derived locally, so a usable
//! placeholder can always be returned even when the lookup fails.

use async_trait::async_trait;
use log::{debug, error, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{string_or_number, ToolExecutor};
use crate::backend::{CompletionBackend, GenerateRequest};
use crate::extract::extract_as;
use crate::grounding::web_sources;
use crate::prompts;
use crate::types::{GroundingChunk, ToolKind, ToolRequest};

pub const VIDEO_ID_LEN: usize = 11;
pub const INVALID_VIDEO_REFERENCE: &str = "Please enter a valid YouTube URL.";

const PLACEHOLDER_TITLE: &str = "Unknown Video";
const PLACEHOLDER_CHANNEL: &str = "YouTube";
const PLACEHOLDER_VIEWS: &str = "---";
const PARSE_FAILED_DESCRIPTION: &str = "Could not parse metadata.";
const FETCH_FAILED_DESCRIPTION: &str =
    "Could not fetch metadata, but you can still try downloading.";

const DOWNLOAD_HELPER_URL: &str = "https://cobalt.tools/?u=";

static VIDEO_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.*(?:youtu\.be/|v/|/u/\w/|embed/|shorts/|watch\?)\??v?=?([^#&?/]*).*")
        .expect("Invalid video URL regex")
});

// ============================================================================
// Video References
// ============================================================================

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract an 11-character video id from a bare id or any YouTube URL form.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_video_id(input) {
        return Some(input.to_string());
    }
    VIDEO_URL_RE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|id| is_video_id(id))
        .map(str::to_string)
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/hqdefault.jpg", video_id)
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub fn download_url(video_id: &str) -> String {
    format!(
        "{}{}",
        DOWNLOAD_HELPER_URL,
        urlencoding::encode(&watch_url(video_id))
    )
}

// ============================================================================
// Payload and Result
// ============================================================================

/// Metadata fields the model is asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub channel: String,
    #[serde(deserialize_with = "string_or_number")]
    pub views: String,
    pub description: String,
}

/// Model metadata plus locally derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoData {
    pub title: String,
    pub channel: String,
    pub views: String,
    pub description: String,
    pub video_id: String,
    pub thumbnail: String,
    pub watch_url: String,
    pub download_url: String,
}

impl VideoData {
    pub fn from_metadata(metadata: VideoMetadata, video_id: &str) -> Self {
        Self {
            title: metadata.title,
            channel: metadata.channel,
            views: metadata.views,
            description: metadata.description,
            video_id: video_id.to_string(),
            thumbnail: thumbnail_url(video_id),
            watch_url: watch_url(video_id),
            download_url: download_url(video_id),
        }
    }

    pub fn placeholder(video_id: &str, description: &str) -> Self {
        Self::from_metadata(
            VideoMetadata {
                title: PLACEHOLDER_TITLE.to_string(),
                channel: PLACEHOLDER_CHANNEL.to_string(),
                views: PLACEHOLDER_VIEWS.to_string(),
                description: description.to_string(),
            },
            video_id,
        )
    }
}

/// Video lookup outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum VideoResult {
    Metadata {
        data: VideoData,
        sources: Vec<GroundingChunk>,
    },
    /// Lookup failed; `data` is synthesized from the id alone.
    Placeholder {
        data: VideoData,
        reason: String,
        sources: Vec<GroundingChunk>,
    },
    /// The input held no recognizable video id.
    Rejected {
        error: String,
    },
}

impl VideoResult {
    /// Video data, real or placeholder.
    pub fn data(&self) -> Option<&VideoData> {
        match self {
            Self::Metadata { data, .. } | Self::Placeholder { data, .. } => Some(data),
            Self::Rejected { .. } => None,
        }
    }
}

// ============================================================================
// Tool Implementation
// ============================================================================

/// Tool to look up a YouTube video.
pub struct VideoTool<B: CompletionBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: CompletionBackend + ?Sized> VideoTool<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Look up a video by URL or bare id.
    pub async fn fetch(&self, reference: &str) -> VideoResult {
        let request = ToolRequest::new(ToolKind::Video, reference);
        let (Some(video_id), Ok(prompt)) =
            (extract_video_id(reference), prompts::build_prompt(&request))
        else {
            debug!("Rejected video reference {:?}", reference);
            return VideoResult::Rejected {
                error: INVALID_VIDEO_REFERENCE.to_string(),
            };
        };

        let request = GenerateRequest::grounded(prompt);
        let completion = match self.backend.generate(request).await {
            Ok(completion) => completion,
            Err(e) => {
                error!("Video lookup for {} failed: {}", video_id, e);
                return VideoResult::Placeholder {
                    data: VideoData::placeholder(&video_id, FETCH_FAILED_DESCRIPTION),
                    reason: e.to_string(),
                    sources: Vec::new(),
                };
            }
        };

        let sources = web_sources(&completion.grounding_chunks);
        match extract_as::<VideoMetadata>(&completion.text) {
            Ok(metadata) => VideoResult::Metadata {
                data: VideoData::from_metadata(metadata, &video_id),
                sources,
            },
            Err(e) => {
                warn!("Video metadata parse failed for {}: {}", video_id, e);
                VideoResult::Placeholder {
                    data: VideoData::placeholder(&video_id, PARSE_FAILED_DESCRIPTION),
                    reason: e.to_string(),
                    sources,
                }
            }
        }
    }
}

impl<B: CompletionBackend + ?Sized> Clone for VideoTool<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

#[async_trait]
impl<B: CompletionBackend + ?Sized> ToolExecutor for VideoTool<B> {
    const KIND: ToolKind = ToolKind::Video;

    type Output = VideoResult;

    async fn execute(&self, request: &ToolRequest) -> VideoResult {
        self.fetch(&request.input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AiError;
    use crate::fake::FakeBackend;

    const ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn test_extract_video_id_url_forms() {
        for input in [
            "dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/v/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "  https://m.youtube.com/watch?v=dQw4w9WgXcQ#t=1  ",
        ] {
            assert_eq!(extract_video_id(input).as_deref(), Some(ID), "{}", input);
        }
    }

    #[test]
    fn test_extract_video_id_rejects() {
        for input in [
            "",
            "hello world",
            "https://www.youtube.com/watch?v=short",
            "https://example.com/page",
            "dQw4w9WgXcQextra",
        ] {
            assert_eq!(extract_video_id(input), None, "{}", input);
        }
    }

    #[test]
    fn test_derived_urls() {
        assert_eq!(
            thumbnail_url(ID),
            "https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        );
        assert_eq!(
            download_url(ID),
            "https://cobalt.tools/?u=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3DdQw4w9WgXcQ"
        );
    }

    #[tokio::test]
    async fn test_metadata_with_numeric_views() {
        let backend = Arc::new(FakeBackend::new().with_text(
            r#"{"title":"Never Gonna Give You Up","channel":"Rick Astley","views":1500000000,"description":"Classic."}"#,
        ));
        let tool = VideoTool::new(backend);

        match tool.fetch(&format!("https://youtu.be/{}", ID)).await {
            VideoResult::Metadata { data, .. } => {
                assert_eq!(data.title, "Never Gonna Give You Up");
                assert_eq!(data.views, "1500000000");
                assert_eq!(data.video_id, ID);
                assert_eq!(data.thumbnail, thumbnail_url(ID));
            }
            other => panic!("expected metadata, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_backend_failure_yields_placeholder() {
        let backend = Arc::new(FakeBackend::new().with_error(AiError::transport("offline")));
        let tool = VideoTool::new(backend);

        match tool.fetch(ID).await {
            VideoResult::Placeholder { data, sources, .. } => {
                assert_eq!(data.video_id, ID);
                assert_eq!(
                    data.thumbnail,
                    "https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
                );
                assert_eq!(data.title, "Unknown Video");
                assert_eq!(data.description, FETCH_FAILED_DESCRIPTION);
                assert!(sources.is_empty());
            }
            other => panic!("expected placeholder, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unparseable_metadata_yields_placeholder() {
        let backend = Arc::new(FakeBackend::new().with_text("I couldn't find that video."));
        let tool = VideoTool::new(backend);

        let result = tool.fetch(ID).await;
        let data = result.data().unwrap();
        assert!(matches!(result, VideoResult::Placeholder { .. }));
        assert_eq!(data.description, PARSE_FAILED_DESCRIPTION);
        assert_eq!(data.thumbnail, thumbnail_url(ID));
    }

    #[tokio::test]
    async fn test_invalid_reference_skips_backend() {
        let backend = Arc::new(FakeBackend::new());
        let tool = VideoTool::new(backend.clone());

        assert!(matches!(
            tool.fetch("not a video").await,
            VideoResult::Rejected { .. }
        ));
        assert!(backend.requests().is_empty());
    }
}
