//! Weather tool - real-time conditions and forecast via a grounded call.

use async_trait::async_trait;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ToolExecutor;
use crate::backend::{CompletionBackend, GenerateRequest};
use crate::error::AiError;
use crate::extract::extract_as;
use crate::grounding::web_sources;
use crate::prompts;
use crate::types::{GroundingChunk, ToolKind, ToolRequest};

pub const WEATHER_MISSING_LOCATION: &str = "Enter a city or location to look up.";
pub const WEATHER_UNAVAILABLE: &str = "Weather data is unavailable right now.";
pub const WEATHER_NO_DATA: &str = "Could not retrieve structured data.";

// ============================================================================
// Payload and Result
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temp_c: f64,
    pub condition: String,
    pub humidity: f64,
    pub wind_kph: f64,
    pub feels_like_c: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub location: String,
    pub current: CurrentWeather,
    pub forecast: Vec<ForecastDay>,
    pub summary: String,
}

/// Weather lookup outcome.
///
/// `sources` only holds citations with a web URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum WeatherResult {
    Forecast {
        data: WeatherData,
        sources: Vec<GroundingChunk>,
    },
    /// The model answered in prose instead of JSON.
    #[serde(rename_all = "camelCase")]
    RawText {
        raw_text: String,
        sources: Vec<GroundingChunk>,
    },
    Unavailable {
        error: String,
    },
}

impl WeatherResult {
    fn unavailable(error: &str) -> Self {
        Self::Unavailable {
            error: error.to_string(),
        }
    }

    pub fn data(&self) -> Option<&WeatherData> {
        match self {
            Self::Forecast { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn sources(&self) -> &[GroundingChunk] {
        match self {
            Self::Forecast { sources, .. } | Self::RawText { sources, .. } => sources,
            Self::Unavailable { .. } => &[],
        }
    }
}

// ============================================================================
// Tool Implementation
// ============================================================================

/// Tool to look up weather for a free-form location.
pub struct WeatherTool<B: CompletionBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: CompletionBackend + ?Sized> WeatherTool<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn fetch(&self, query: &str) -> WeatherResult {
        let query = query.trim();
        let Ok(prompt) = prompts::build_prompt(&ToolRequest::new(ToolKind::Weather, query)) else {
            return WeatherResult::unavailable(WEATHER_MISSING_LOCATION);
        };

        let request = GenerateRequest::grounded(prompt);
        let completion = match self.backend.generate(request).await {
            Ok(completion) => completion,
            Err(e) => {
                error!("Weather lookup for {:?} failed: {}", query, e);
                return WeatherResult::unavailable(WEATHER_UNAVAILABLE);
            }
        };

        let sources = web_sources(&completion.grounding_chunks);
        match extract_as::<WeatherData>(&completion.text) {
            Ok(data) => {
                debug!(
                    "Weather for {:?}: {} forecast days, {} sources",
                    query,
                    data.forecast.len(),
                    sources.len()
                );
                WeatherResult::Forecast { data, sources }
            }
            Err(AiError::EmptyResult(_)) => {
                warn!("Weather lookup for {:?} returned no text", query);
                WeatherResult::unavailable(WEATHER_NO_DATA)
            }
            Err(e) => {
                warn!("Weather JSON parse failed for {:?}: {}", query, e);
                WeatherResult::RawText {
                    raw_text: completion.text,
                    sources,
                }
            }
        }
    }
}

impl<B: CompletionBackend + ?Sized> Clone for WeatherTool<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

#[async_trait]
impl<B: CompletionBackend + ?Sized> ToolExecutor for WeatherTool<B> {
    const KIND: ToolKind = ToolKind::Weather;

    type Output = WeatherResult;

    async fn execute(&self, request: &ToolRequest) -> WeatherResult {
        self.fetch(&request.input).await
    }
}
