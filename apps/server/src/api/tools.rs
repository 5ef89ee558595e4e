//! Tool endpoints.
//!
//! Every tool answers 200 with its own result object, including the failure
//! variants. Only malformed request bodies are rejected.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use omnitool_ai::{
    catalog::{self, CatalogResponse},
    ImageResult, MathResult, RecipeResult, ToolExecutor, ToolKind, ToolRequest, ToolResult,
    TranslationResult, VideoResult, WeatherResult,
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiResult, main_lib::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInput {
    pub input: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateInput {
    pub input: String,
    #[serde(default)]
    pub target_language: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguagesResponse {
    pub languages: Vec<String>,
    pub default_target_language: String,
}

async fn list_tools() -> Json<CatalogResponse> {
    Json(catalog::catalog())
}

async fn list_languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: catalog::translation_languages().to_vec(),
        default_target_language: catalog::default_target_language().to_string(),
    })
}

async fn run_weather(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ToolInput>, JsonRejection>,
) -> ApiResult<Json<WeatherResult>> {
    let Json(body) = payload?;
    Ok(Json(state.tools.weather.fetch(&body.input).await))
}

async fn run_video(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ToolInput>, JsonRejection>,
) -> ApiResult<Json<VideoResult>> {
    let Json(body) = payload?;
    Ok(Json(state.tools.video.fetch(&body.input).await))
}

async fn run_translate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TranslateInput>, JsonRejection>,
) -> ApiResult<Json<TranslationResult>> {
    let Json(body) = payload?;
    let request = ToolRequest {
        kind: ToolKind::Translate,
        input: body.input,
        target_language: body.target_language,
    };
    Ok(Json(state.tools.translate.execute(&request).await))
}

async fn run_math(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ToolInput>, JsonRejection>,
) -> ApiResult<Json<MathResult>> {
    let Json(body) = payload?;
    Ok(Json(state.tools.math.solve(&body.input).await))
}

async fn run_recipe(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ToolInput>, JsonRejection>,
) -> ApiResult<Json<RecipeResult>> {
    let Json(body) = payload?;
    Ok(Json(state.tools.recipe.generate(&body.input).await))
}

async fn run_image(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ToolInput>, JsonRejection>,
) -> ApiResult<Json<ImageResult>> {
    let Json(body) = payload?;
    Ok(Json(state.tools.image.generate(&body.input).await))
}

/// Generic dispatch by `kind`.
async fn run_tool(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ToolRequest>, JsonRejection>,
) -> ApiResult<Json<ToolResult>> {
    let Json(request) = payload?;
    Ok(Json(state.tools.run(&request).await))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/languages", get(list_languages))
        .route("/tools/run", post(run_tool))
        .route("/tools/weather", post(run_weather))
        .route("/tools/video", post(run_video))
        .route("/tools/translate", post(run_translate))
        .route("/tools/math", post(run_math))
        .route("/tools/recipe", post(run_recipe))
        .route("/tools/image", post(run_image))
}
