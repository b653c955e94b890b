use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::models::{Code, OverallEvaluation, RefinementOperation, RefinementPlan, Theme};

/// Counts from the generation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub num_chunks: usize,
    pub num_codes: usize,
    pub initial_num_themes: usize,
}

/// An operation that could not be applied, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedOperation {
    pub operation: RefinementOperation,
    pub reason: String,
}

/// What a refinement round did to the theme set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementRecord {
    pub plan: RefinementPlan,
    pub skipped: Vec<SkippedOperation>,
    pub theme_count_before: usize,
    pub theme_count_after: usize,
}

/// One evaluation round and the refinement that followed it, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based evaluation round
    pub iteration: u32,
    pub evaluation: OverallEvaluation,
    pub average_score: f64,
    pub refinement: Option<RefinementRecord>,
    /// Theme set after this round (post-refinement when one ran)
    pub themes: Vec<Theme>,
}

/// Terminal state of a completed session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Accepted,
    MaxIterationsReached,
}

impl SessionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Accepted => "ACCEPTED",
            SessionStatus::MaxIterationsReached => "MAX_ITERATIONS_REACHED",
        }
    }
}

/// The complete outcome of one analysis session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: String,
    pub session_name: String,
    /// RFC 3339 completion time
    pub timestamp: String,
    pub configuration: AnalysisConfig,
    pub generation: GenerationStats,
    pub codes: Vec<Code>,
    pub initial_themes: Vec<Theme>,
    /// Number of refinement rounds applied
    pub refinement_iterations: u32,
    pub history: Vec<IterationRecord>,
    pub final_themes: Vec<Theme>,
    pub final_average_score: f64,
    pub accepted: bool,
    pub status: SessionStatus,
}

impl SessionResult {
    /// The last evaluation performed in the session
    pub fn final_evaluation(&self) -> Option<&OverallEvaluation> {
        self.history.last().map(|record| &record.evaluation)
    }
}
