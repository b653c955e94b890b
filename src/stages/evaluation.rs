use std::sync::Arc;

use tracing::{debug, info};

use crate::error::EvaluationFailure;
use crate::llm::schemas::{evaluation_schema, ScoreResponse};
use crate::llm::{
    build_evaluation_prompt, invoke_structured, validate_scores, GatewayRequest, LlmGateway,
    RetryPolicy, EVALUATION_SYSTEM_PROMPT,
};
use crate::models::{Code, EvaluationCriteria, EvaluationResult, OverallEvaluation, Theme, ThemeSet};

/// Sampling temperature for scoring (lower for more repeatable scores)
pub const EVALUATION_TEMPERATURE: f64 = 0.2;

/// Configuration for the evaluation stage
#[derive(Debug, Clone, Default)]
pub struct EvaluationConfig {
    pub criteria: EvaluationCriteria,
    pub retry: RetryPolicy,
}

/// Scores every theme against the evaluation criteria
pub struct EvaluationStage {
    gateway: Arc<dyn LlmGateway>,
    config: EvaluationConfig,
}

impl EvaluationStage {
    pub fn new(gateway: Arc<dyn LlmGateway>, config: EvaluationConfig) -> Self {
        Self { gateway, config }
    }

    /// Score each theme in turn and average locally
    ///
    /// A theme that cannot be scored fails the whole evaluation; there is no
    /// partial result.
    pub async fn evaluate(
        &self,
        themes: &ThemeSet,
        codes: &[Code],
    ) -> Result<OverallEvaluation, EvaluationFailure> {
        if themes.is_empty() {
            return Err(EvaluationFailure::NoThemes);
        }

        let mut results = Vec::with_capacity(themes.len());
        for (index, theme) in themes.iter().enumerate() {
            debug!(
                "Evaluating theme {}/{}: {} ({})",
                index + 1,
                themes.len(),
                theme.name,
                theme.theme_id
            );
            let result = self.evaluate_theme(theme, themes, codes).await?;
            debug!(
                "Theme {}: mean {:.2}",
                theme.theme_id,
                result.mean_score()
            );
            results.push(result);
        }

        let evaluation = OverallEvaluation::from_results(results);
        info!(
            "Evaluation: {} themes, average {:.2}/5.0",
            evaluation.results.len(),
            evaluation.average_score
        );

        Ok(evaluation)
    }

    async fn evaluate_theme(
        &self,
        theme: &Theme,
        themes: &ThemeSet,
        codes: &[Code],
    ) -> Result<EvaluationResult, EvaluationFailure> {
        let request = GatewayRequest {
            system: EVALUATION_SYSTEM_PROMPT.to_string(),
            prompt: build_evaluation_prompt(theme, themes, codes, &self.config.criteria),
            response_schema: evaluation_schema(),
            temperature: EVALUATION_TEMPERATURE,
        };

        let response: ScoreResponse =
            invoke_structured(self.gateway.as_ref(), &request, &self.config.retry, validate_scores)
                .await
                .map_err(|source| EvaluationFailure::Theme {
                    theme_id: theme.theme_id.clone(),
                    theme_name: theme.name.clone(),
                    source,
                })?;

        Ok(into_result(theme, response))
    }
}

/// Convert a validated score response (every score within 1..=5)
fn into_result(theme: &Theme, response: ScoreResponse) -> EvaluationResult {
    let score = |value: i64| value.clamp(1, 5) as u8;
    EvaluationResult {
        theme_id: theme.theme_id.clone(),
        theme_name: theme.name.clone(),
        coverage: score(response.coverage_score),
        actionability: score(response.actionability_score),
        distinctiveness: score(response.distinctiveness_score),
        relevance: score(response.relevance_score),
        feedback: response.feedback(),
        needs_refinement: response.needs_refinement,
        refinement_suggestions: response.refinement_suggestions,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::GatewayErrorKind;
    use crate::llm::mock::ScriptedGateway;
    use crate::llm::schemas::EVALUATION_TOOL;
    use crate::models::ThemeDraft;

    fn scores(values: [i64; 4]) -> serde_json::Value {
        json!({
            "coverage_score": values[0],
            "coverage_feedback": "coverage feedback",
            "actionability_score": values[1],
            "actionability_feedback": "actionability feedback",
            "distinctiveness_score": values[2],
            "distinctiveness_feedback": "distinctiveness feedback",
            "relevance_score": values[3],
            "relevance_feedback": "relevance feedback",
            "needs_refinement": values.iter().any(|&v| v < 4),
            "refinement_suggestions": []
        })
    }

    fn config() -> EvaluationConfig {
        EvaluationConfig {
            criteria: EvaluationCriteria::default(),
            retry: RetryPolicy {
                max_retries: 1,
                delay: Duration::ZERO,
            },
        }
    }

    fn themes(count: usize) -> ThemeSet {
        ThemeSet::from_drafts((0..count).map(|i| ThemeDraft {
            name: format!("Theme {}", i),
            description: format!("Description {}", i),
            code_ids: vec![0],
        }))
    }

    fn codes() -> Vec<Code> {
        vec![Code {
            code_id: 0,
            text: "Worry about exercise".to_string(),
            source_chunk_id: 0,
        }]
    }

    #[tokio::test]
    async fn test_average_computed_locally() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .respond(EVALUATION_TOOL, scores([3, 3, 3, 3]))
                .respond(EVALUATION_TOOL, scores([5, 5, 4, 4])),
        );
        let stage = EvaluationStage::new(gateway.clone(), config());

        let evaluation = stage.evaluate(&themes(2), &codes()).await.unwrap();

        assert_eq!(evaluation.results.len(), 2);
        assert_eq!(evaluation.results[0].theme_id, "theme_0");
        assert_eq!(evaluation.results[1].mean_score(), 4.5);
        assert!((evaluation.average_score - 3.75).abs() < 1e-9);

        let requests = gateway.requests(EVALUATION_TOOL);
        assert_eq!(requests[0].temperature, EVALUATION_TEMPERATURE);
        assert!(requests[0].prompt.contains("Name: Theme 0"));
        assert!(requests[1].prompt.contains("Name: Theme 1"));
    }

    #[tokio::test]
    async fn test_out_of_range_score_retried() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .respond(EVALUATION_TOOL, scores([6, 3, 3, 3]))
                .respond(EVALUATION_TOOL, scores([4, 3, 3, 3])),
        );
        let stage = EvaluationStage::new(gateway.clone(), config());

        let evaluation = stage.evaluate(&themes(1), &codes()).await.unwrap();
        assert_eq!(evaluation.results[0].coverage, 4);
        assert_eq!(gateway.call_count(EVALUATION_TOOL), 2);
    }

    #[tokio::test]
    async fn test_persistent_malformed_score_fails() {
        let missing = json!({"coverage_score": 4});
        let gateway = Arc::new(
            ScriptedGateway::new()
                .respond(EVALUATION_TOOL, scores([4, 4, 4, 4]))
                .respond(EVALUATION_TOOL, missing.clone())
                .respond(EVALUATION_TOOL, missing),
        );
        let stage = EvaluationStage::new(gateway, config());

        let err = stage.evaluate(&themes(2), &codes()).await.unwrap_err();
        match err {
            EvaluationFailure::Theme {
                theme_id, source, ..
            } => {
                assert_eq!(theme_id, "theme_1");
                assert_eq!(source.kind, GatewayErrorKind::SchemaViolation);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_theme_set_fails() {
        let stage = EvaluationStage::new(Arc::new(ScriptedGateway::new()), config());
        let err = stage.evaluate(&ThemeSet::new(), &codes()).await.unwrap_err();
        assert!(matches!(err, EvaluationFailure::NoThemes));
    }
}
