use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Classification of a failed gateway call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    /// Network failure, timeout or rate limit
    Transient,
    /// Response did not match the expected structure
    SchemaViolation,
    /// Credentials rejected
    Auth,
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatewayErrorKind::Transient => "transient",
            GatewayErrorKind::SchemaViolation => "schema_violation",
            GatewayErrorKind::Auth => "auth",
        };
        f.write_str(name)
    }
}

/// Error returned by an LLM gateway call
#[derive(Debug, Clone, Error)]
#[error("{kind} gateway error: {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn schema_violation(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::SchemaViolation,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::Auth,
            message: message.into(),
        }
    }

    /// Auth failures never succeed on a second attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind, GatewayErrorKind::Auth)
    }
}

/// The transcript had no words to chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("transcript contains no words")]
pub struct EmptyInputError;

#[derive(Debug, Error)]
pub enum GenerationFailure {
    #[error(transparent)]
    EmptyInput(#[from] EmptyInputError),

    #[error("code extraction failed for chunk {chunk_id} ({word_count} words): {source}")]
    Coding {
        chunk_id: usize,
        word_count: usize,
        #[source]
        source: GatewayError,
    },

    #[error("no codes were extracted from {chunk_count} chunk(s)")]
    NoCodes { chunk_count: usize },

    #[error("theme synthesis failed over {code_count} codes: {source}")]
    Synthesis {
        code_count: usize,
        #[source]
        source: GatewayError,
    },
}

#[derive(Debug, Error)]
pub enum EvaluationFailure {
    #[error("no themes to evaluate")]
    NoThemes,

    #[error("evaluation of theme {theme_id} ({theme_name:?}) failed: {source}")]
    Theme {
        theme_id: String,
        theme_name: String,
        #[source]
        source: GatewayError,
    },
}

#[derive(Debug, Error)]
pub enum RefinementFailure {
    #[error("refinement plan for {theme_count} themes failed: {source}")]
    Plan {
        theme_count: usize,
        #[source]
        source: GatewayError,
    },

    #[error("refinement plan ({operation_count} operations) would remove every theme")]
    EmptyThemeSet { operation_count: usize },
}

/// Pipeline stage that raised a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generation,
    Evaluation,
    Refinement,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Generation => "generation",
            Stage::Evaluation => "evaluation",
            Stage::Refinement => "refinement",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Generation(#[from] GenerationFailure),
    #[error(transparent)]
    Evaluation(#[from] EvaluationFailure),
    #[error(transparent)]
    Refinement(#[from] RefinementFailure),
}

impl StageFailure {
    pub fn stage(&self) -> Stage {
        match self {
            StageFailure::Generation(_) => Stage::Generation,
            StageFailure::Evaluation(_) => Stage::Evaluation,
            StageFailure::Refinement(_) => Stage::Refinement,
        }
    }
}

/// Terminal failure of an analysis session
#[derive(Debug, Error)]
#[error("session failed during {stage} at iteration {iteration}: {source}")]
pub struct SessionFailure {
    pub stage: Stage,
    /// Evaluation round in progress (0 while generating)
    pub iteration: u32,
    #[source]
    pub source: StageFailure,
}

impl SessionFailure {
    pub fn new(iteration: u32, source: impl Into<StageFailure>) -> Self {
        let source = source.into();
        Self {
            stage: source.stage(),
            iteration,
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_iterations must be within 1..=10, got {0}")]
    MaxIterations(u32),

    #[error("acceptance_threshold must be within 1.0..=5.0, got {0}")]
    AcceptanceThreshold(f64),

    #[error("max_chunk_words must be at least 1")]
    MaxChunkWords,

    #[error("max_retries must be within 0..=5, got {0}")]
    MaxRetries(u32),

    #[error("unknown evaluation criterion {0:?} (expected coverage, actionability, distinctiveness or relevance)")]
    UnknownCriterion(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_is_not_retryable() {
        assert!(GatewayError::transient("timeout").is_retryable());
        assert!(GatewayError::schema_violation("missing field").is_retryable());
        assert!(!GatewayError::auth("401").is_retryable());
    }

    #[test]
    fn test_session_failure_carries_stage() {
        let failure = SessionFailure::new(
            2,
            EvaluationFailure::Theme {
                theme_id: "theme_3".to_string(),
                theme_name: "Care coordination".to_string(),
                source: GatewayError::schema_violation("coverage out of range"),
            },
        );

        assert_eq!(failure.stage, Stage::Evaluation);
        assert_eq!(failure.iteration, 2);
        let message = failure.to_string();
        assert!(message.contains("evaluation at iteration 2"));
        assert!(message.contains("theme_3"));
    }
}
