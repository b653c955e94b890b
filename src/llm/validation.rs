use crate::llm::schemas::{CodesResponse, PlanResponse, ScoreResponse, ThemesResponse};
use crate::models::{word_count, RefinementOperation, RefinementPlan, ThemeDraft};

/// Limits applied to model responses before they are accepted
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Maximum words in a single code
    pub max_code_words: usize,
    /// Soft limit on words in a theme description
    pub max_description_words: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_code_words: 25,
            max_description_words: 40,
        }
    }
}

fn into_result(errors: Vec<String>) -> Result<(), String> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

/// Validate codes extracted from one chunk
pub fn validate_codes(response: &CodesResponse, config: &ValidationConfig) -> Result<(), String> {
    let mut errors = Vec::new();

    for (index, code) in response.codes.iter().enumerate() {
        let words = word_count(&code.text);
        if words == 0 {
            errors.push(format!("Code {} is empty", index));
        } else if words > config.max_code_words {
            errors.push(format!(
                "Code {} has {} words (max {})",
                index, words, config.max_code_words
            ));
        }
    }

    into_result(errors)
}

fn check_draft(
    label: &str,
    draft: &ThemeDraft,
    code_count: usize,
    config: &ValidationConfig,
    errors: &mut Vec<String>,
) {
    if draft.name.trim().is_empty() {
        errors.push(format!("{} has an empty name", label));
    }

    let words = word_count(&draft.description);
    if words == 0 {
        errors.push(format!("{} ({}) has an empty description", label, draft.name));
    } else if words > config.max_description_words {
        errors.push(format!(
            "{} ({}) description has {} words (max {})",
            label, draft.name, words, config.max_description_words
        ));
    }

    for &code_id in &draft.code_ids {
        if code_id >= code_count {
            errors.push(format!(
                "{} ({}) references unknown code {} (have {})",
                label, draft.name, code_id, code_count
            ));
        }
    }
}

/// Validate synthesized themes against the code list
pub fn validate_themes(
    response: &ThemesResponse,
    code_count: usize,
    config: &ValidationConfig,
) -> Result<(), String> {
    let mut errors = Vec::new();

    if response.themes.is_empty() {
        errors.push("No themes returned".to_string());
    }

    for (index, draft) in response.themes.iter().enumerate() {
        check_draft(&format!("Theme {}", index), draft, code_count, config, &mut errors);
    }

    into_result(errors)
}

/// Validate that every score is within 1..=5
pub fn validate_scores(response: &ScoreResponse) -> Result<(), String> {
    let errors = response
        .scores()
        .iter()
        .filter(|(_, score)| !(1..=5).contains(score))
        .map(|(criterion, score)| format!("{} score {} is outside 1..=5", criterion, score))
        .collect();

    into_result(errors)
}

/// Validate a refinement plan's structure and payloads, converting it into a
/// typed plan
pub fn validate_plan(
    response: PlanResponse,
    code_count: usize,
    config: &ValidationConfig,
) -> Result<RefinementPlan, String> {
    let mut errors = Vec::new();
    let mut operations = Vec::with_capacity(response.operations.len());

    for (index, raw) in response.operations.into_iter().enumerate() {
        let operation = match RefinementOperation::try_from(raw) {
            Ok(operation) => operation,
            Err(e) => {
                errors.push(format!("Operation {}: {}", index, e));
                continue;
            }
        };

        let label = format!("Operation {} ({})", index, operation.kind());
        match &operation {
            RefinementOperation::Delete { .. } => {}
            RefinementOperation::Combine { new_theme, .. } => {
                if let Some(draft) = new_theme {
                    check_draft(&label, draft, code_count, config, &mut errors);
                }
            }
            RefinementOperation::Split { split_into, .. } => {
                for draft in split_into {
                    check_draft(&label, draft, code_count, config, &mut errors);
                }
            }
            RefinementOperation::Add { new_theme, .. } => {
                check_draft(&label, new_theme, code_count, config, &mut errors);
            }
        }
        operations.push(operation);
    }

    into_result(errors)?;
    Ok(RefinementPlan {
        operations,
        summary: response.summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::schemas::{CodeItem, RawOperation};

    fn draft(description: &str, code_ids: Vec<usize>) -> ThemeDraft {
        ThemeDraft {
            name: "Navigating uncertainty".to_string(),
            description: description.to_string(),
            code_ids,
        }
    }

    #[test]
    fn test_validate_codes_word_limit() {
        let config = ValidationConfig::default();
        let ok = CodesResponse {
            codes: vec![CodeItem {
                text: "Parents feel anxious before exercise clearance".to_string(),
            }],
        };
        assert!(validate_codes(&ok, &config).is_ok());

        let long = CodesResponse {
            codes: vec![CodeItem {
                text: "word ".repeat(26),
            }],
        };
        let err = validate_codes(&long, &config).unwrap_err();
        assert!(err.contains("26 words"));

        let empty = CodesResponse {
            codes: vec![CodeItem { text: "  ".to_string() }],
        };
        assert!(validate_codes(&empty, &config).is_err());
    }

    #[test]
    fn test_validate_themes() {
        let config = ValidationConfig::default();

        let ok = ThemesResponse {
            themes: vec![draft("Parents describe living with uncertainty", vec![0, 2])],
        };
        assert!(validate_themes(&ok, 3, &config).is_ok());

        let none = ThemesResponse { themes: vec![] };
        assert!(validate_themes(&none, 3, &config).is_err());

        let bad_code = ThemesResponse {
            themes: vec![draft("Uncertainty", vec![7])],
        };
        let err = validate_themes(&bad_code, 3, &config).unwrap_err();
        assert!(err.contains("unknown code 7"));

        let wordy = ThemesResponse {
            themes: vec![draft(&"long ".repeat(41), vec![0])],
        };
        assert!(validate_themes(&wordy, 3, &config).is_err());
    }

    #[test]
    fn test_validate_scores_range() {
        let mut response = ScoreResponse {
            coverage_score: 4,
            coverage_feedback: String::new(),
            actionability_score: 5,
            actionability_feedback: String::new(),
            distinctiveness_score: 1,
            distinctiveness_feedback: String::new(),
            relevance_score: 3,
            relevance_feedback: String::new(),
            needs_refinement: false,
            refinement_suggestions: vec![],
        };
        assert!(validate_scores(&response).is_ok());

        response.relevance_score = 6;
        response.coverage_score = 0;
        let err = validate_scores(&response).unwrap_err();
        assert!(err.contains("relevance score 6"));
        assert!(err.contains("coverage score 0"));
    }

    #[test]
    fn test_validate_plan_reports_structural_errors() {
        let config = ValidationConfig::default();
        let response = PlanResponse {
            operations: vec![
                RawOperation {
                    kind: "merge".to_string(),
                    targets: vec!["theme_0".to_string()],
                    rationale: String::new(),
                    merge_into: None,
                    new_theme: None,
                    split_into: vec![],
                },
                RawOperation {
                    kind: "add".to_string(),
                    targets: vec![],
                    rationale: String::new(),
                    merge_into: None,
                    new_theme: Some(draft("New pattern", vec![99])),
                    split_into: vec![],
                },
            ],
            summary: String::new(),
        };

        let err = validate_plan(response, 10, &config).unwrap_err();
        assert!(err.contains("Operation 0: unknown operation kind"));
        assert!(err.contains("unknown code 99"));
    }

    #[test]
    fn test_validate_plan_converts_operations() {
        let response = PlanResponse {
            operations: vec![RawOperation {
                kind: "delete".to_string(),
                targets: vec!["theme_3".to_string()],
                rationale: "off topic".to_string(),
                merge_into: None,
                new_theme: None,
                split_into: vec![],
            }],
            summary: "Drop one".to_string(),
        };

        let plan = validate_plan(response, 10, &ValidationConfig::default()).unwrap();
        assert_eq!(plan.summary, "Drop one");
        assert_eq!(
            plan.operations,
            vec![RefinementOperation::Delete {
                targets: vec!["theme_3".to_string()],
                rationale: "off topic".to_string(),
            }]
        );
    }
}
