use serde::Deserialize;
use serde_json::json;

use crate::llm::ResponseSchema;
use crate::models::{CriterionFeedback, OperationKind, RefinementOperation, ThemeDraft};

pub const CODES_TOOL: &str = "submit_codes";
pub const THEMES_TOOL: &str = "submit_themes";
pub const EVALUATION_TOOL: &str = "submit_evaluation";
pub const REFINEMENT_TOOL: &str = "submit_refinement_plan";

/// Codes extracted from one chunk
#[derive(Debug, Clone, Deserialize)]
pub struct CodesResponse {
    pub codes: Vec<CodeItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeItem {
    pub text: String,
}

/// Themes synthesized from the full code list
#[derive(Debug, Clone, Deserialize)]
pub struct ThemesResponse {
    pub themes: Vec<ThemeDraft>,
}

/// Scores and feedback for one theme
///
/// Scores are decoded wide so out-of-range values reach validation
/// instead of failing as a decode error.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreResponse {
    pub coverage_score: i64,
    pub coverage_feedback: String,
    pub actionability_score: i64,
    pub actionability_feedback: String,
    pub distinctiveness_score: i64,
    pub distinctiveness_feedback: String,
    pub relevance_score: i64,
    pub relevance_feedback: String,
    #[serde(default)]
    pub needs_refinement: bool,
    #[serde(default)]
    pub refinement_suggestions: Vec<String>,
}

impl ScoreResponse {
    pub fn scores(&self) -> [(&'static str, i64); 4] {
        [
            ("coverage", self.coverage_score),
            ("actionability", self.actionability_score),
            ("distinctiveness", self.distinctiveness_score),
            ("relevance", self.relevance_score),
        ]
    }

    pub fn feedback(&self) -> CriterionFeedback {
        CriterionFeedback {
            coverage: self.coverage_feedback.clone(),
            actionability: self.actionability_feedback.clone(),
            distinctiveness: self.distinctiveness_feedback.clone(),
            relevance: self.relevance_feedback.clone(),
        }
    }
}

/// Refinement plan as returned by the model, before structural checks
#[derive(Debug, Clone, Deserialize)]
pub struct PlanResponse {
    pub operations: Vec<RawOperation>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOperation {
    pub kind: String,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub merge_into: Option<String>,
    #[serde(default)]
    pub new_theme: Option<ThemeDraft>,
    #[serde(default)]
    pub split_into: Vec<ThemeDraft>,
}

impl TryFrom<RawOperation> for RefinementOperation {
    type Error = String;

    fn try_from(raw: RawOperation) -> Result<Self, Self::Error> {
        let kind = OperationKind::parse(&raw.kind)
            .ok_or_else(|| format!("unknown operation kind {:?}", raw.kind))?;

        match kind {
            OperationKind::Delete => {
                if raw.targets.is_empty() {
                    return Err("DELETE requires at least one target".to_string());
                }
                Ok(RefinementOperation::Delete {
                    targets: raw.targets,
                    rationale: raw.rationale,
                })
            }
            OperationKind::Combine => {
                if raw.targets.len() < 2 {
                    return Err(format!(
                        "COMBINE requires at least two targets, got {}",
                        raw.targets.len()
                    ));
                }
                match (&raw.merge_into, &raw.new_theme) {
                    (None, None) => {
                        return Err("COMBINE requires merge_into or new_theme".to_string());
                    }
                    (Some(_), Some(_)) => {
                        return Err("COMBINE takes merge_into or new_theme, not both".to_string());
                    }
                    _ => {}
                }
                if let Some(primary) = &raw.merge_into {
                    if !raw.targets.contains(primary) {
                        return Err(format!(
                            "COMBINE merge_into {} is not one of its targets",
                            primary
                        ));
                    }
                }
                Ok(RefinementOperation::Combine {
                    targets: raw.targets,
                    rationale: raw.rationale,
                    merge_into: raw.merge_into,
                    new_theme: raw.new_theme,
                })
            }
            OperationKind::Split => {
                let [target] = <[String; 1]>::try_from(raw.targets).map_err(|targets| {
                    format!("SPLIT requires exactly one target, got {}", targets.len())
                })?;
                if raw.split_into.len() < 2 {
                    return Err(format!(
                        "SPLIT of {} requires at least two split_into themes, got {}",
                        target,
                        raw.split_into.len()
                    ));
                }
                Ok(RefinementOperation::Split {
                    target,
                    rationale: raw.rationale,
                    split_into: raw.split_into,
                })
            }
            OperationKind::Add => {
                if !raw.targets.is_empty() {
                    return Err("ADD must not name targets".to_string());
                }
                let new_theme = raw
                    .new_theme
                    .ok_or_else(|| "ADD requires new_theme".to_string())?;
                Ok(RefinementOperation::Add {
                    rationale: raw.rationale,
                    new_theme,
                })
            }
        }
    }
}

fn theme_draft_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "description": {
                "type": "string",
                "description": "Approximately 25-word description of the theme"
            },
            "code_ids": {
                "type": "array",
                "items": {"type": "integer", "minimum": 0},
                "description": "Ids of the codes this theme encompasses"
            }
        },
        "required": ["name", "description", "code_ids"]
    })
}

pub fn codes_schema() -> ResponseSchema {
    ResponseSchema {
        name: CODES_TOOL,
        description: "Submit the codes extracted from the transcript chunk",
        schema: json!({
            "type": "object",
            "properties": {
                "codes": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "text": {
                                "type": "string",
                                "description": "Concise code, fewer than 25 words"
                            }
                        },
                        "required": ["text"]
                    }
                }
            },
            "required": ["codes"]
        }),
    }
}

pub fn themes_schema() -> ResponseSchema {
    ResponseSchema {
        name: THEMES_TOOL,
        description: "Submit the themes synthesized from the codes",
        schema: json!({
            "type": "object",
            "properties": {
                "themes": {
                    "type": "array",
                    "items": theme_draft_schema()
                }
            },
            "required": ["themes"]
        }),
    }
}

pub fn evaluation_schema() -> ResponseSchema {
    let score = json!({"type": "integer", "minimum": 1, "maximum": 5});
    let feedback = json!({"type": "string"});
    ResponseSchema {
        name: EVALUATION_TOOL,
        description: "Submit the scores and feedback for the theme",
        schema: json!({
            "type": "object",
            "properties": {
                "coverage_score": score,
                "coverage_feedback": feedback,
                "actionability_score": score,
                "actionability_feedback": feedback,
                "distinctiveness_score": score,
                "distinctiveness_feedback": feedback,
                "relevance_score": score,
                "relevance_feedback": feedback,
                "needs_refinement": {"type": "boolean"},
                "refinement_suggestions": {
                    "type": "array",
                    "items": {"type": "string"}
                }
            },
            "required": [
                "coverage_score", "coverage_feedback",
                "actionability_score", "actionability_feedback",
                "distinctiveness_score", "distinctiveness_feedback",
                "relevance_score", "relevance_feedback",
                "needs_refinement", "refinement_suggestions"
            ]
        }),
    }
}

pub fn refinement_schema() -> ResponseSchema {
    ResponseSchema {
        name: REFINEMENT_TOOL,
        description: "Submit the refinement plan for the current themes",
        schema: json!({
            "type": "object",
            "properties": {
                "operations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "kind": {"type": "string", "enum": ["delete", "combine", "split", "add"]},
                            "targets": {
                                "type": "array",
                                "items": {"type": "string"},
                                "description": "Theme ids the operation applies to (empty for add)"
                            },
                            "rationale": {"type": "string"},
                            "merge_into": {
                                "type": "string",
                                "description": "For combine: the target theme id that absorbs the others"
                            },
                            "new_theme": theme_draft_schema(),
                            "split_into": {
                                "type": "array",
                                "items": theme_draft_schema(),
                                "description": "For split: two or more replacement themes"
                            }
                        },
                        "required": ["kind", "targets", "rationale"]
                    }
                },
                "summary": {"type": "string"}
            },
            "required": ["operations", "summary"]
        }),
    }
}
