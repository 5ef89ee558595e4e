//! Math tool - step-by-step problem solving.

use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ToolExecutor;
use crate::backend::{CompletionBackend, GenerateRequest};
use crate::extract::extract_as;
use crate::prompts::{self, MATH_FIELDS};
use crate::types::{ToolKind, ToolRequest};

pub const MATH_UNAVAILABLE: &str = "Could not solve this problem.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathData {
    pub topic: String,
    pub result: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MathResult {
    Solved { data: MathData },
    Unavailable { error: String },
}

impl MathResult {
    pub fn data(&self) -> Option<&MathData> {
        match self {
            Self::Solved { data } => Some(data),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Tool to solve a math problem.
pub struct MathTool<B: CompletionBackend + ?Sized> {
    backend: Arc<B>,
}

impl<B: CompletionBackend + ?Sized> MathTool<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn solve(&self, problem: &str) -> MathResult {
        let problem = problem.trim();
        let Ok(prompt) = prompts::build_prompt(&ToolRequest::new(ToolKind::Math, problem)) else {
            return unavailable();
        };

        let request = GenerateRequest::structured(
            prompt,
            Some(prompts::response_schema(MATH_FIELDS)),
        );

        let result = self
            .backend
            .generate(request)
            .await
            .and_then(|completion| extract_as::<MathData>(&completion.text));

        match result {
            Ok(data) => {
                debug!("Solved {} problem in {} steps", data.topic, data.steps.len());
                MathResult::Solved { data }
            }
            Err(e) => {
                error!("Math solve failed: {}", e);
                unavailable()
            }
        }
    }
}

fn unavailable() -> MathResult {
    MathResult::Unavailable {
        error: MATH_UNAVAILABLE.to_string(),
    }
}

impl<B: CompletionBackend + ?Sized> Clone for MathTool<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

#[async_trait]
impl<B: CompletionBackend + ?Sized> ToolExecutor for MathTool<B> {
    const KIND: ToolKind = ToolKind::Math;

    type Output = MathResult;

    async fn execute(&self, request: &ToolRequest) -> MathResult {
        self.solve(&request.input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AiError;
    use crate::fake::FakeBackend;

    #[tokio::test]
    async fn test_solves_linear_equation() {
        let backend = Arc::new(FakeBackend::new().with_text(
            r#"{"topic":"Algebra","result":"x = 4","steps":["Subtract 3 from both sides: 2x = 8","Divide both sides by 2: x = 4"]}"#,
        ));
        let tool = MathTool::new(backend.clone());

        let result = tool.solve("2x + 3 = 11").await;

        assert_eq!(
            result,
            MathResult::Solved {
                data: MathData {
                    topic: "Algebra".to_string(),
                    result: "x = 4".to_string(),
                    steps: vec![
                        "Subtract 3 from both sides: 2x = 8".to_string(),
                        "Divide both sides by 2: x = 4".to_string(),
                    ],
                }
            }
        );
        assert!(backend.requests()[0].prompt.contains("\"2x + 3 = 11\""));
    }

    #[tokio::test]
    async fn test_solves_fenced_answer_with_two_steps() {
        let backend = Arc::new(FakeBackend::new().with_text(
            "```json\n{\"topic\":\"Linear equations\",\"result\":\"x = 5\",\"steps\":[\"Subtract 5 from both sides: 3x = 15\",\"Divide both sides by 3: x = 5\"]}\n```",
        ));
        let tool = MathTool::new(backend.clone());

        let result = tool
            .execute(&ToolRequest::new(ToolKind::Math, "Solve 3x + 5 = 20"))
            .await;

        let data = result.data().expect("solved");
        assert_eq!(data.result, "x = 5");
        assert_eq!(data.topic, "Linear equations");
        assert_eq!(data.steps.len(), 2);
        assert_eq!(data.steps[1], "Divide both sides by 3: x = 5");
        assert!(backend.requests()[0].prompt.contains("\"Solve 3x + 5 = 20\""));
    }

    #[tokio::test]
    async fn test_failures_have_no_data() {
        let backend = Arc::new(
            FakeBackend::new()
                .with_error(AiError::transport("timeout"))
                .with_text(r#"{"topic":"Algebra"}"#),
        );
        let tool = MathTool::new(backend);

        assert!(tool.solve("1 + 1").await.data().is_none());
        assert!(tool.solve("1 + 1").await.data().is_none());
    }
}
