//! Gemini backend.
//!
//! One-shot tool calls go straight to the REST `generateContent` endpoint,
//! since tools need the raw candidate parts (inline images) and the
//! grounding metadata. Chat streams through rig-core's Gemini client.

use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use log::{debug, error, warn};
use reqwest::Client as HttpClient;
use rig::{
    agent::MultiTurnStreamItem,
    client::CompletionClient,
    completion::Message,
    message::{AssistantContent, Text, UserContent},
    providers::gemini,
    streaming::{StreamedAssistantContent, StreamingChat},
    OneOrMany,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::backend::{
    ChatBackend, ChatChunk, ChatChunkStream, ChatContext, CompletionBackend, GenerateRequest,
    GenerationMode,
};
use crate::config::GeminiConfig;
use crate::error::AiError;
use crate::grounding::grounding_chunks;
use crate::types::{CandidatePart, ChatRole, ChatTurn, InlineData, RawCompletion};

/// Buffered chunks between the rig stream task and the consumer.
const CHAT_CHANNEL_CAPACITY: usize = 100;

const API_VERSION_SEGMENT: &str = "/v1beta";

// ============================================================================
// Backend
// ============================================================================

/// Google Gemini implementation of both backend traits.
pub struct GeminiBackend {
    http: HttpClient,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self, AiError> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AiError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn model_for<'a>(&'a self, request: &'a GenerateRequest) -> &'a str {
        if let Some(model) = request.model.as_deref() {
            return model;
        }
        match request.mode {
            GenerationMode::Image { .. } => &self.config.image_model,
            _ => &self.config.text_model,
        }
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<RawCompletion, AiError> {
        let api_key = self.config.api_key()?;
        let model = self.model_for(&request);
        let url = format!("{}/models/{}:generateContent", self.config.base_url, model);

        debug!(
            "Gemini generateContent model={} mode={}",
            model,
            mode_label(&request.mode)
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request_body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini API returned {} for model {}", status, model);
            return Err(AiError::transport(format!(
                "Gemini API error {}: {}",
                status, body
            )));
        }

        let envelope: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AiError::malformed(format!("Invalid Gemini response: {}", e)))?;

        parse_response(envelope)
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    async fn stream_chat(
        &self,
        context: &ChatContext,
        message: &str,
    ) -> Result<ChatChunkStream, AiError> {
        let key = self.config.api_key()?.to_string();
        let client = gemini::Client::<HttpClient>::builder()
            .api_key(&key)
            .base_url(chat_base_url(&self.config.base_url))
            .build()
            .map_err(|e| AiError::Provider(e.to_string()))?;
        let agent = client
            .agent(&self.config.chat_model)
            .preamble(&context.system_instruction)
            .build();

        let prompt = Message::User {
            content: OneOrMany::one(UserContent::Text(Text {
                text: message.to_string(),
            })),
        };
        let history = build_history(&context.history);
        let context_id = context.context_id.clone();

        debug!(
            "Opening chat stream for context {} with {} history turns",
            context_id,
            history.len()
        );

        let (tx, rx) = mpsc::channel::<Result<ChatChunk, AiError>>(CHAT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut stream = agent.stream_chat(prompt, history).multi_turn(1).await;
            let mut streamed_text = false;

            while let Some(item) = stream.next().await {
                let chunk = match item {
                    Ok(MultiTurnStreamItem::StreamAssistantItem(StreamedAssistantContent::Text(
                        Text { text },
                    ))) => {
                        if text.is_empty() {
                            continue;
                        }
                        streamed_text = true;
                        Ok(ChatChunk::text(text))
                    }

                    // Some responses arrive only as a final aggregate.
                    Ok(MultiTurnStreamItem::FinalResponse(final_response)) => {
                        let text = final_response.response().to_string();
                        if streamed_text || text.trim().is_empty() {
                            continue;
                        }
                        Ok(ChatChunk::text(text))
                    }

                    Ok(_) => continue,

                    Err(e) => {
                        error!("Chat stream error in context {}: {}", context_id, e);
                        let _ = tx.send(Err(AiError::Provider(e.to_string()))).await;
                        break;
                    }
                };

                if tx.send(chunk).await.is_err() {
                    debug!("Chat stream consumer for context {} went away", context_id);
                    break;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// rig adds the API version itself, so the configured REST base loses it.
fn chat_base_url(base_url: &str) -> &str {
    base_url.trim_end_matches('/').trim_end_matches(API_VERSION_SEGMENT)
}

/// Convert session turns into rig history messages.
fn build_history(turns: &[ChatTurn]) -> Vec<Message> {
    turns
        .iter()
        .map(|turn| match turn.role {
            ChatRole::User => Message::User {
                content: OneOrMany::one(UserContent::Text(Text {
                    text: turn.text.clone(),
                })),
            },
            ChatRole::Assistant => Message::Assistant {
                id: None,
                content: OneOrMany::one(AssistantContent::Text(Text {
                    text: turn.text.clone(),
                })),
            },
        })
        .collect()
}

// ============================================================================
// REST Wire Format
// ============================================================================

fn mode_label(mode: &GenerationMode) -> &'static str {
    match mode {
        GenerationMode::Plain => "plain",
        GenerationMode::Structured { .. } => "structured",
        GenerationMode::Grounded => "grounded",
        GenerationMode::Image { .. } => "image",
    }
}

fn request_body(request: &GenerateRequest) -> Value {
    let mut body = json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.prompt }],
        }],
    });

    match &request.mode {
        GenerationMode::Plain => {}
        GenerationMode::Structured { schema } => {
            let mut generation_config = json!({ "responseMimeType": "application/json" });
            if let Some(schema) = schema {
                generation_config["responseSchema"] = schema.clone();
            }
            body["generationConfig"] = generation_config;
        }
        GenerationMode::Grounded => {
            body["tools"] = json!([{ "google_search": {} }]);
        }
        GenerationMode::Image { aspect_ratio } => {
            body["generationConfig"] = json!({
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": { "aspectRatio": aspect_ratio },
            });
        }
    }

    body
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<Value>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<WireInlineData>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

fn parse_response(envelope: GenerateContentResponse) -> Result<RawCompletion, AiError> {
    let Some(candidate) = envelope.candidates.into_iter().next() else {
        let reason = envelope
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(AiError::empty(format!("Gemini returned nothing: {}", reason)));
    };

    let mut text = String::new();
    let mut parts = Vec::new();

    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if part.thought {
            continue;
        }
        if let Some(part_text) = part.text {
            text.push_str(&part_text);
            parts.push(CandidatePart::Text(part_text));
        }
        if let Some(inline) = part.inline_data {
            let data = base64::engine::general_purpose::STANDARD
                .decode(inline.data.trim())
                .map_err(|e| AiError::malformed(format!("Invalid inline data: {}", e)))?;
            parts.push(CandidatePart::InlineData(InlineData {
                mime_type: inline.mime_type,
                data,
            }));
        }
    }

    if parts.is_empty() {
        debug!(
            "Gemini candidate has no content (finish reason {:?})",
            candidate.finish_reason
        );
    }

    Ok(RawCompletion {
        text,
        parts,
        grounding_chunks: grounding_chunks(candidate.grounding_metadata.as_ref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroundingChunk;

    fn parse(value: Value) -> Result<RawCompletion, AiError> {
        parse_response(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_request_body_per_mode() {
        let body = request_body(&GenerateRequest::grounded("weather in Oslo"));
        assert_eq!(body["contents"][0]["parts"][0]["text"], "weather in Oslo");
        assert_eq!(body["tools"], json!([{ "google_search": {} }]));
        assert!(body.get("generationConfig").is_none());

        let schema = json!({ "type": "OBJECT" });
        let body = request_body(&GenerateRequest::structured("p", Some(schema.clone())));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"], schema);
        assert!(body.get("tools").is_none());

        let body = request_body(&GenerateRequest::image("a fox", "1:1"));
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "1:1");

        let body = request_body(&GenerateRequest::plain("p"));
        assert!(body.get("generationConfig").is_none() && body.get("tools").is_none());
    }

    #[test]
    fn test_model_selection() {
        let backend = GeminiBackend::new(GeminiConfig::default()).unwrap();
        let request = GenerateRequest::image("a fox", "1:1");
        assert_eq!(backend.model_for(&request), "gemini-2.5-flash-image");
        let request = GenerateRequest::plain("p");
        assert_eq!(backend.model_for(&request), "gemini-2.5-flash");
        let request = GenerateRequest::plain("p").with_model("custom");
        assert_eq!(backend.model_for(&request), "custom");
    }

    #[test]
    fn test_parse_text_and_grounding() {
        let completion = parse(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "thinking...", "thought": true },
                    { "text": "```json\n{\"a\":" },
                    { "text": "1}\n```" }
                ]},
                "groundingMetadata": { "groundingChunks": [
                    { "web": { "uri": "https://met.no", "title": "met.no" } }
                ]}
            }]
        }))
        .unwrap();

        assert_eq!(completion.text, "```json\n{\"a\":1}\n```");
        assert_eq!(completion.parts.len(), 2);
        assert_eq!(
            completion.grounding_chunks,
            vec![GroundingChunk::new("https://met.no", "met.no")]
        );
    }

    #[test]
    fn test_parse_inline_image() {
        let completion = parse(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here is your image" },
                { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
            ]}}]
        }))
        .unwrap();

        let inline = completion.first_inline_data().unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, vec![1, 2, 3]);
        assert!(completion.grounding_chunks.is_empty());
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } })),
            Err(AiError::EmptyResult(msg)) if msg.contains("SAFETY")
        ));
        assert!(matches!(
            parse(json!({ "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": "%%%" } }
            ]}}]})),
            Err(AiError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_chat_client_follows_configured_base_url() {
        assert_eq!(
            chat_base_url(crate::config::DEFAULT_GEMINI_BASE_URL),
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(
            chat_base_url("http://localhost:9090/v1beta/"),
            "http://localhost:9090"
        );
        assert_eq!(chat_base_url("http://proxy.test"), "http://proxy.test");
    }

    #[test]
    fn test_build_history_roles() {
        let history = build_history(&[ChatTurn::user("hi"), ChatTurn::assistant("hello")]);
        assert_eq!(history.len(), 2);
        assert!(matches!(history[0], Message::User { .. }));
        assert!(matches!(history[1], Message::Assistant { .. }));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let backend = GeminiBackend::new(GeminiConfig::default()).unwrap();
        let result = backend.generate(GenerateRequest::plain("hi")).await;
        assert!(matches!(result, Err(AiError::MissingApiKey(_))));
    }
}
