use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::EvaluationCriteria;

/// Default model identifier passed through to the gateway
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Configuration for one analysis session
///
/// Serialized verbatim into the session result as the configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Opaque model identifier handed to the gateway
    pub model: String,
    /// Maximum number of refinement rounds (1-10)
    pub max_iterations: u32,
    /// Average score that ends the session as accepted (1.0-5.0)
    pub acceptance_threshold: f64,
    /// Criterion name -> description, overriding the defaults
    #[serde(default)]
    pub criteria_overrides: BTreeMap<String, String>,
    /// Upper bound on words per transcript chunk
    pub max_chunk_words: usize,
    /// Retries per gateway call on transient or schema failures
    pub max_retries: u32,
    /// Delay before each retry in milliseconds
    pub retry_delay_ms: u64,
    /// Hard limit on words in a single code
    pub max_code_words: usize,
    /// Soft limit on words in a theme description
    pub max_description_words: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_iterations: 5,
            acceptance_threshold: 4.0,
            criteria_overrides: BTreeMap::new(),
            max_chunk_words: 4000,
            max_retries: 1,
            retry_delay_ms: 1000,
            max_code_words: 25,
            max_description_words: 40,
        }
    }
}

impl AnalysisConfig {
    /// Check every option against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=10).contains(&self.max_iterations) {
            return Err(ConfigError::MaxIterations(self.max_iterations));
        }
        if !(1.0..=5.0).contains(&self.acceptance_threshold) {
            return Err(ConfigError::AcceptanceThreshold(self.acceptance_threshold));
        }
        if self.max_chunk_words == 0 {
            return Err(ConfigError::MaxChunkWords);
        }
        if self.max_retries > 5 {
            return Err(ConfigError::MaxRetries(self.max_retries));
        }
        self.criteria()?;
        Ok(())
    }

    /// Evaluation criteria with overrides applied over the defaults
    pub fn criteria(&self) -> Result<EvaluationCriteria, ConfigError> {
        EvaluationCriteria::default().with_overrides(&self.criteria_overrides)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Load criteria overrides from a JSON object file
///
/// Expected format:
/// ```json
/// {
///   "coverage": "Themes should capture every caregiver concern raised",
///   "relevance": "Themes must reflect the parents' own experiences"
/// }
/// ```
pub fn load_criteria_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read criteria file: {:?}", path))?;
    let overrides: BTreeMap<String, String> =
        serde_json::from_str(&content).context("Failed to parse criteria JSON")?;
    Ok(overrides)
}
