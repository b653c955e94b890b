use std::fmt;
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::error::{ConfigError, SessionFailure};
use crate::llm::{LlmGateway, RetryPolicy, ValidationConfig};
use crate::models::{
    IterationRecord, OverallEvaluation, RefinementRecord, SessionResult, SessionStatus, ThemeSet,
};
use crate::stages::{
    ChunkerConfig, EvaluationConfig, EvaluationStage, GenerationConfig, GenerationStage,
    RefinementConfig, RefinementStage,
};

/// Where a session is in the generate / evaluate / refine loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Generated,
    Evaluating,
    Refining,
    Accepted,
    Exhausted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Accepted | SessionState::Exhausted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Init => "INIT",
            SessionState::Generated => "GENERATED",
            SessionState::Evaluating => "EVALUATING",
            SessionState::Refining => "REFINING",
            SessionState::Accepted => "ACCEPTED",
            SessionState::Exhausted => "EXHAUSTED",
        };
        f.write_str(name)
    }
}

/// Runs analysis sessions: generation, then evaluate/refine until the
/// theme set is accepted or the refinement budget is spent
///
/// Holds no per-session state; each `run_analysis` call owns its own theme
/// set and history.
pub struct Orchestrator {
    config: AnalysisConfig,
    generation: GenerationStage,
    evaluation: EvaluationStage,
    refinement: RefinementStage,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn LlmGateway>, config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let retry = RetryPolicy {
            max_retries: config.max_retries,
            delay: config.retry_delay(),
        };
        let validation = ValidationConfig {
            max_code_words: config.max_code_words,
            max_description_words: config.max_description_words,
        };

        let generation = GenerationStage::new(
            gateway.clone(),
            GenerationConfig {
                chunker: ChunkerConfig {
                    max_words: config.max_chunk_words,
                },
                validation: validation.clone(),
                retry,
            },
        );
        let evaluation = EvaluationStage::new(
            gateway.clone(),
            EvaluationConfig {
                criteria: config.criteria()?,
                retry,
            },
        );
        let refinement = RefinementStage::new(gateway, RefinementConfig { validation, retry });

        Ok(Self {
            config,
            generation,
            evaluation,
            refinement,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run one complete session over `transcript`
    ///
    /// Returns a result for both accepted and exhausted sessions. Any stage
    /// failure ends the session with a `SessionFailure` naming the stage and
    /// the evaluation round (0 during generation).
    pub async fn run_analysis(
        &self,
        transcript: &str,
        session_name: Option<&str>,
    ) -> Result<SessionResult, SessionFailure> {
        let session_id = Uuid::new_v4().to_string();
        let session_name = session_name
            .map(str::to_string)
            .unwrap_or_else(default_session_name);
        let threshold = self.config.acceptance_threshold;

        let mut state = SessionState::Init;
        info!(
            "Session {} ({}): model {}, threshold {:.2}, max {} refinements",
            session_name, session_id, self.config.model, threshold, self.config.max_iterations
        );

        let output = self
            .generation
            .generate(transcript)
            .await
            .map_err(|e| SessionFailure::new(0, e))?;
        transition(&mut state, SessionState::Generated);

        let generation = output.stats();
        let codes = output.codes;
        let initial_themes = output.themes.themes().to_vec();
        let mut themes = output.themes;

        let mut history: Vec<IterationRecord> = Vec::new();
        let mut refinements: u32 = 0;
        let mut iteration: u32 = 0;

        let status = loop {
            iteration += 1;
            transition(&mut state, SessionState::Evaluating);

            let evaluation = self
                .evaluation
                .evaluate(&themes, &codes)
                .await
                .map_err(|e| SessionFailure::new(iteration, e))?;
            info!(
                "Iteration {}: {} themes, average {:.2}/5.0 (threshold {:.2})",
                iteration,
                themes.len(),
                evaluation.average_score,
                threshold
            );

            if evaluation.meets(threshold) {
                history.push(record(iteration, evaluation, None, &themes));
                transition(&mut state, SessionState::Accepted);
                break SessionStatus::Accepted;
            }

            if refinements >= self.config.max_iterations {
                warn!(
                    "Threshold not reached after {} refinements, returning last theme set",
                    refinements
                );
                history.push(record(iteration, evaluation, None, &themes));
                transition(&mut state, SessionState::Exhausted);
                break SessionStatus::MaxIterationsReached;
            }

            transition(&mut state, SessionState::Refining);
            let plan = self
                .refinement
                .refine(&themes, &evaluation, &codes)
                .await
                .map_err(|e| SessionFailure::new(iteration, e))?;
            let (refined, refinement) = self
                .refinement
                .apply(&themes, &plan)
                .map_err(|e| SessionFailure::new(iteration, e))?;

            themes = refined;
            refinements += 1;
            history.push(record(iteration, evaluation, Some(refinement), &themes));
        };

        debug_assert!(state.is_terminal());
        let final_average_score = history.last().map_or(0.0, |r| r.average_score);
        let accepted = status == SessionStatus::Accepted;

        info!(
            "Session {} finished {}: {} themes, score {:.2}/5.0, {} refinements",
            session_name,
            status.label(),
            themes.len(),
            final_average_score,
            refinements
        );

        Ok(SessionResult {
            session_id,
            session_name,
            timestamp: Local::now().to_rfc3339(),
            configuration: self.config.clone(),
            generation,
            codes,
            initial_themes,
            refinement_iterations: refinements,
            history,
            final_themes: themes.themes().to_vec(),
            final_average_score,
            accepted,
            status,
        })
    }
}

fn transition(state: &mut SessionState, next: SessionState) {
    debug!("Session state: {} -> {}", state, next);
    *state = next;
}

fn record(
    iteration: u32,
    evaluation: OverallEvaluation,
    refinement: Option<RefinementRecord>,
    themes: &ThemeSet,
) -> IterationRecord {
    IterationRecord {
        iteration,
        average_score: evaluation.average_score,
        evaluation,
        refinement,
        themes: themes.themes().to_vec(),
    }
}

fn default_session_name() -> String {
    format!("tama_session_{}", Local::now().format("%Y%m%d_%H%M%S"))
}
