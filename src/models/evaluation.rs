use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Criteria every theme is scored against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Coverage,
    Actionability,
    Distinctiveness,
    Relevance,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::Coverage,
        Criterion::Actionability,
        Criterion::Distinctiveness,
        Criterion::Relevance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Criterion::Coverage => "coverage",
            Criterion::Actionability => "actionability",
            Criterion::Distinctiveness => "distinctiveness",
            Criterion::Relevance => "relevance",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Descriptions of what each criterion demands of a theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationCriteria {
    pub coverage: String,
    pub actionability: String,
    pub distinctiveness: String,
    pub relevance: String,
}

impl Default for EvaluationCriteria {
    fn default() -> Self {
        Self {
            coverage: "should comprehensively capture all important patterns and concepts from the data"
                .to_string(),
            actionability: "should encapsulate a single concept that is clear and actionable"
                .to_string(),
            distinctiveness: "should be clearly distinct from other themes without overlap"
                .to_string(),
            relevance: "must accurately reflect the participants' experiences and concerns"
                .to_string(),
        }
    }
}

impl EvaluationCriteria {
    /// Replace the descriptions named in `overrides`, keeping the rest
    pub fn with_overrides(
        mut self,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        for (name, text) in overrides {
            let criterion = Criterion::from_name(name)
                .ok_or_else(|| ConfigError::UnknownCriterion(name.clone()))?;
            *self.description_mut(criterion) = text.clone();
        }
        Ok(self)
    }

    pub fn description(&self, criterion: Criterion) -> &str {
        match criterion {
            Criterion::Coverage => &self.coverage,
            Criterion::Actionability => &self.actionability,
            Criterion::Distinctiveness => &self.distinctiveness,
            Criterion::Relevance => &self.relevance,
        }
    }

    fn description_mut(&mut self, criterion: Criterion) -> &mut String {
        match criterion {
            Criterion::Coverage => &mut self.coverage,
            Criterion::Actionability => &mut self.actionability,
            Criterion::Distinctiveness => &mut self.distinctiveness,
            Criterion::Relevance => &mut self.relevance,
        }
    }
}

/// Free-text feedback per criterion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionFeedback {
    pub coverage: String,
    pub actionability: String,
    pub distinctiveness: String,
    pub relevance: String,
}

/// Scores for one theme in one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub theme_id: String,
    pub theme_name: String,
    /// Scores in 1..=5
    pub coverage: u8,
    pub actionability: u8,
    pub distinctiveness: u8,
    pub relevance: u8,
    pub feedback: CriterionFeedback,
    #[serde(default)]
    pub needs_refinement: bool,
    #[serde(default)]
    pub refinement_suggestions: Vec<String>,
}

impl EvaluationResult {
    pub fn score(&self, criterion: Criterion) -> u8 {
        match criterion {
            Criterion::Coverage => self.coverage,
            Criterion::Actionability => self.actionability,
            Criterion::Distinctiveness => self.distinctiveness,
            Criterion::Relevance => self.relevance,
        }
    }

    /// Mean of the four criterion scores
    pub fn mean_score(&self) -> f64 {
        let total: u32 = Criterion::ALL.iter().map(|&c| u32::from(self.score(c))).sum();
        f64::from(total) / Criterion::ALL.len() as f64
    }
}

/// Arithmetic mean of the per-theme mean scores (0.0 when empty)
pub fn average_score(results: &[EvaluationResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(EvaluationResult::mean_score).sum::<f64>() / results.len() as f64
}

/// All theme scores for one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallEvaluation {
    pub results: Vec<EvaluationResult>,
    /// Computed locally from `results`
    pub average_score: f64,
    pub global_feedback: String,
}

impl OverallEvaluation {
    pub fn from_results(results: Vec<EvaluationResult>) -> Self {
        let average_score = average_score(&results);
        let global_feedback = summarize_feedback(&results, average_score);
        Self {
            results,
            average_score,
            global_feedback,
        }
    }

    pub fn meets(&self, threshold: f64) -> bool {
        self.average_score >= threshold
    }

    /// Number of themes scoring below 4 on `criterion`
    pub fn low_score_count(&self, criterion: Criterion) -> usize {
        self.results
            .iter()
            .filter(|r| r.score(criterion) < 4)
            .count()
    }
}

fn summarize_feedback(results: &[EvaluationResult], average_score: f64) -> String {
    let flagged = results.iter().filter(|r| r.needs_refinement).count();
    let mut feedback = format!(
        "Average score {:.2}/5.0 across {} theme(s); {} flagged for refinement.",
        average_score,
        results.len(),
        flagged
    );

    let issues: Vec<String> = Criterion::ALL
        .iter()
        .filter_map(|&criterion| {
            let count = results.iter().filter(|r| r.score(criterion) < 4).count();
            (count > 0).then(|| format!("{} ({} themes)", criterion, count))
        })
        .collect();

    if !issues.is_empty() {
        feedback.push_str(&format!(" Scores below 4: {}.", issues.join(", ")));
    }

    feedback
}
