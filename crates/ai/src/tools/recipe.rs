//! Recipe tool - full recipe generation for a dish or ingredient list.

use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{string_or_number, ToolExecutor};
use crate::backend::{CompletionBackend, GenerateRequest};
use crate::extract::extract_as;
use crate::prompts::{self, RECIPE_FIELDS};
use crate::types::{ToolKind, ToolRequest};

pub const RECIPE_UNAVAILABLE: &str = "Could not generate a recipe.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeData {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: String,
    #[serde(deserialize_with = "string_or_number")]
    pub calories: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RecipeResult {
    Generated { data: RecipeData },
    Unavailable { error: String },
}

impl RecipeResult {
    pub fn data(&self) -> Option<&RecipeData> {
        match self {
            Self::Generated { data } => Some(data),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Tool to generate a recipe.
pub struct RecipeTool<B: CompletionBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: CompletionBackend + ?Sized> RecipeTool<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn generate(&self, dish: &str) -> RecipeResult {
        let dish = dish.trim();
        let Ok(prompt) = prompts::build_prompt(&ToolRequest::new(ToolKind::Recipe, dish)) else {
            return unavailable();
        };

        let request = GenerateRequest::structured(
            prompt,
            Some(prompts::response_schema(RECIPE_FIELDS)),
        );

        let result = self
            .backend
            .generate(request)
            .await
            .and_then(|completion| extract_as::<RecipeData>(&completion.text));

        match result {
            Ok(data) => {
                debug!(
                    "Generated recipe {:?} with {} ingredients",
                    data.title,
                    data.ingredients.len()
                );
                RecipeResult::Generated { data }
            }
            Err(e) => {
                error!("Recipe generation for {:?} failed: {}", dish, e);
                unavailable()
            }
        }
    }
}

fn unavailable() -> RecipeResult {
    RecipeResult::Unavailable {
        error: RECIPE_UNAVAILABLE.to_string(),
    }
}

impl<B: CompletionBackend + ?Sized> Clone for RecipeTool<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

#[async_trait]
impl<B: CompletionBackend + ?Sized> ToolExecutor for RecipeTool<B> {
    const KIND: ToolKind = ToolKind::Recipe;

    type Output = RecipeResult;

    async fn execute(&self, request: &ToolRequest) -> RecipeResult {
        self.generate(&request.input).await
    }
}
