use std::io::Write;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::models::{
    Code, GenerationStats, IterationRecord, OverallEvaluation, RefinementRecord, SessionResult,
    Theme,
};

/// Final result file, always written
pub const FINAL_RESULTS_FILE: &str = "00_final_results.json";
/// Human-readable summary, always written
pub const SUMMARY_FILE: &str = "00_summary.txt";
/// Generation snapshot, written with intermediates
pub const GENERATION_FILE: &str = "01_generation.json";

const RULE_WIDTH: usize = 80;

/// Writes a session's artifacts under `<output_dir>/<session_name>/`
pub struct SessionWriter {
    session_dir: PathBuf,
    save_intermediate: bool,
}

#[derive(Serialize)]
struct GenerationSnapshot<'a> {
    session_name: &'a str,
    generation: &'a GenerationStats,
    codes: &'a [Code],
    themes: &'a [Theme],
}

#[derive(Serialize)]
struct EvaluationSnapshot<'a> {
    iteration: u32,
    themes: usize,
    evaluation: &'a OverallEvaluation,
}

#[derive(Serialize)]
struct RefinementSnapshot<'a> {
    iteration: u32,
    refinement: &'a RefinementRecord,
    themes: &'a [Theme],
}

impl SessionWriter {
    pub fn new(output_dir: &Path, session_name: &str, save_intermediate: bool) -> Result<Self> {
        validate_session_name(session_name)?;
        Ok(Self {
            session_dir: output_dir.join(session_name),
            save_intermediate,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Write every artifact for `result`, returning the session directory
    pub fn write(&self, result: &SessionResult) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.session_dir)
            .with_context(|| format!("Failed to create directory: {:?}", self.session_dir))?;

        if self.save_intermediate {
            self.write_json(
                GENERATION_FILE,
                &GenerationSnapshot {
                    session_name: &result.session_name,
                    generation: &result.generation,
                    codes: &result.codes,
                    themes: &result.initial_themes,
                },
            )?;

            for record in &result.history {
                self.write_iteration(record)?;
            }
        }

        self.write_json(FINAL_RESULTS_FILE, result)?;
        SessionSummary::new(result).write_file(&self.session_dir.join(SUMMARY_FILE))?;

        info!("Session output written to {:?}", self.session_dir);
        Ok(self.session_dir.clone())
    }

    fn write_iteration(&self, record: &IterationRecord) -> Result<()> {
        self.write_json(
            &evaluation_file(record.iteration),
            &EvaluationSnapshot {
                iteration: record.iteration,
                themes: record.evaluation.results.len(),
                evaluation: &record.evaluation,
            },
        )?;

        if let Some(refinement) = &record.refinement {
            self.write_json(
                &refinement_file(record.iteration),
                &RefinementSnapshot {
                    iteration: record.iteration,
                    refinement,
                    themes: &record.themes,
                },
            )?;
        }

        Ok(())
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.session_dir.join(name);
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, value).context("Failed to write JSON")?;
        debug!("Wrote {:?}", path);
        Ok(())
    }
}

/// Write `result` under `output_dir` using its session name
pub fn write_session(
    output_dir: &Path,
    result: &SessionResult,
    save_intermediate: bool,
) -> Result<PathBuf> {
    SessionWriter::new(output_dir, &result.session_name, save_intermediate)?.write(result)
}

/// Session names become a single directory under the output directory
pub fn validate_session_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
        _ => bail!(
            "Invalid session name {:?}: must be a single directory name",
            name
        ),
    }
}

pub fn evaluation_file(iteration: u32) -> String {
    format!("02_evaluation_iter{}.json", iteration)
}

pub fn refinement_file(iteration: u32) -> String {
    format!("03_refinement_iter{}.json", iteration)
}

/// Human-readable session summary
pub struct SessionSummary<'a> {
    result: &'a SessionResult,
}

impl<'a> SessionSummary<'a> {
    pub fn new(result: &'a SessionResult) -> Self {
        Self { result }
    }

    /// Format the summary as plain text
    pub fn format(&self) -> String {
        let result = self.result;
        let mut output = String::new();

        push_heading(&mut output, "TAMA THEMATIC ANALYSIS - SUMMARY");
        output.push_str(&format!("Session: {}\n", result.session_name));
        output.push_str(&format!("Session ID: {}\n", result.session_id));
        output.push_str(&format!("Timestamp: {}\n", result.timestamp));
        output.push_str(&format!("Model: {}\n", result.configuration.model));
        output.push_str(&format!("Status: {}\n", result.status.label()));
        output.push_str(&format!(
            "Final Score: {:.2}/5.0 (threshold {:.2})\n",
            result.final_average_score, result.configuration.acceptance_threshold
        ));
        output.push_str(&format!(
            "Refinement Iterations: {}\n",
            result.refinement_iterations
        ));
        output.push_str(&format!(
            "Generation: {} chunks, {} codes, {} initial themes\n\n",
            result.generation.num_chunks,
            result.generation.num_codes,
            result.generation.initial_num_themes
        ));

        push_heading(&mut output, "FINAL THEMES");
        for (index, theme) in result.final_themes.iter().enumerate() {
            output.push_str(&format!("{}. {} ({})\n", index + 1, theme.name, theme.theme_id));
            output.push_str(&indent(&wrap_text(&theme.description, RULE_WIDTH - 3), 3));
            output.push('\n');
            output.push_str(&format!("   Associated codes: {}\n\n", theme.code_ids.len()));
        }

        let refinements: Vec<&IterationRecord> = result
            .history
            .iter()
            .filter(|r| r.refinement.is_some())
            .collect();
        if !refinements.is_empty() {
            output.push('\n');
            push_heading(&mut output, "REFINEMENT HISTORY");
            for record in refinements {
                if let Some(refinement) = &record.refinement {
                    output.push_str(&format!("Iteration {}:\n", record.iteration));
                    output.push_str(&format!(
                        "  Evaluation Score: {:.2}/5.0\n",
                        record.average_score
                    ));
                    output.push_str(&format!("  Refinement: {}\n", refinement.plan.summary));
                    output.push_str(&format!(
                        "  Operations: {} applied, {} skipped\n",
                        refinement.plan.operations.len() - refinement.skipped.len(),
                        refinement.skipped.len()
                    ));
                    output.push_str(&format!(
                        "  Theme Count: {} -> {}\n\n",
                        refinement.theme_count_before, refinement.theme_count_after
                    ));
                }
            }
        }

        output
    }

    /// Write to a text file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        write!(file, "{}", self.format())?;
        Ok(())
    }
}

fn push_heading(output: &mut String, title: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    output.push_str(&format!("{}\n{}\n{}\n\n", rule, title, rule));
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap text at approximately the given width
fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut line_len = 0;

    for word in text.split_whitespace() {
        if line_len + word.len() + 1 > width && line_len > 0 {
            result.push('\n');
            line_len = 0;
        }
        if line_len > 0 {
            result.push(' ');
            line_len += 1;
        }
        result.push_str(word);
        line_len += word.len();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::models::{RefinementOperation, RefinementPlan, SessionStatus, SkippedOperation};

    fn theme(id: usize, name: &str) -> Theme {
        Theme {
            theme_id: format!("theme_{}", id),
            name: name.to_string(),
            description: format!("{} shaped how parents coped with the diagnosis", name),
            code_ids: vec![id],
        }
    }

    fn evaluation(average_score: f64) -> OverallEvaluation {
        OverallEvaluation {
            results: vec![],
            average_score,
            global_feedback: String::new(),
        }
    }

    fn session() -> SessionResult {
        let initial = vec![theme(0, "Fear"), theme(1, "Trust"), theme(2, "Logistics")];
        let refined = vec![theme(0, "Fear"), theme(1, "Trust")];
        let plan = RefinementPlan {
            operations: vec![
                RefinementOperation::Delete {
                    targets: vec!["theme_2".to_string()],
                    rationale: "not about the child's care".to_string(),
                },
                RefinementOperation::Delete {
                    targets: vec!["theme_9".to_string()],
                    rationale: "duplicate".to_string(),
                },
            ],
            summary: "Remove off-topic theme".to_string(),
        };
        let skipped = vec![SkippedOperation {
            operation: plan.operations[1].clone(),
            reason: "none of [\"theme_9\"] present".to_string(),
        }];

        SessionResult {
            session_id: "7f1c".to_string(),
            session_name: "interview_04".to_string(),
            timestamp: "2026-01-05T10:00:00+00:00".to_string(),
            configuration: AnalysisConfig::default(),
            generation: GenerationStats {
                num_chunks: 1,
                num_codes: 3,
                initial_num_themes: 3,
            },
            codes: vec![],
            initial_themes: initial,
            refinement_iterations: 1,
            history: vec![
                IterationRecord {
                    iteration: 1,
                    evaluation: evaluation(3.1),
                    average_score: 3.1,
                    refinement: Some(RefinementRecord {
                        plan,
                        skipped,
                        theme_count_before: 3,
                        theme_count_after: 2,
                    }),
                    themes: refined.clone(),
                },
                IterationRecord {
                    iteration: 2,
                    evaluation: evaluation(4.2),
                    average_score: 4.2,
                    refinement: None,
                    themes: refined.clone(),
                },
            ],
            final_themes: refined,
            final_average_score: 4.2,
            accepted: true,
            status: SessionStatus::Accepted,
        }
    }

    #[test]
    fn test_write_session_with_intermediates() {
        let dir = tempfile::tempdir().unwrap();
        let session_dir = write_session(dir.path(), &session(), true).unwrap();

        assert_eq!(session_dir, dir.path().join("interview_04"));
        for name in [
            FINAL_RESULTS_FILE,
            SUMMARY_FILE,
            GENERATION_FILE,
            "02_evaluation_iter1.json",
            "02_evaluation_iter2.json",
            "03_refinement_iter1.json",
        ] {
            assert!(session_dir.join(name).exists(), "missing {}", name);
        }
        assert!(!session_dir.join("03_refinement_iter2.json").exists());

        let content = std::fs::read_to_string(session_dir.join(FINAL_RESULTS_FILE)).unwrap();
        let parsed: SessionResult = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.final_themes.len(), 2);
        assert_eq!(parsed.status, SessionStatus::Accepted);
    }

    #[test]
    fn test_write_session_without_intermediates() {
        let dir = tempfile::tempdir().unwrap();
        let session_dir = write_session(dir.path(), &session(), false).unwrap();

        assert!(session_dir.join(FINAL_RESULTS_FILE).exists());
        assert!(session_dir.join(SUMMARY_FILE).exists());
        assert!(!session_dir.join(GENERATION_FILE).exists());
        assert!(!session_dir.join("02_evaluation_iter1.json").exists());
    }

    #[test]
    fn test_session_name_must_stay_in_output_dir() {
        for name in ["../escape", "..", ".", "", "nested/name", "nested\\name", "/tmp/abs"] {
            assert!(validate_session_name(name).is_err(), "accepted {:?}", name);
        }
        assert!(validate_session_name("interview_04").is_ok());
        assert!(validate_session_name("pilot..v2").is_ok());

        let dir = tempfile::tempdir().unwrap();
        let mut result = session();
        result.session_name = "../escape".to_string();
        assert!(write_session(dir.path(), &result, false).is_err());
        assert!(!dir.path().join("..").join("escape").exists());
    }

    #[test]
    fn test_summary_format() {
        let result = session();
        let summary = SessionSummary::new(&result).format();

        assert!(summary.contains("Status: ACCEPTED"));
        assert!(summary.contains("Final Score: 4.20/5.0"));
        assert!(summary.contains("1. Fear (theme_0)"));
        assert!(summary.contains("Iteration 1:"));
        assert!(summary.contains("Operations: 1 applied, 1 skipped"));
        assert!(summary.contains("Theme Count: 3 -> 2"));
        assert!(!summary.contains("Iteration 2:"));
    }

    #[test]
    fn test_wrap_text() {
        let text = "This is a test of the text wrapping function that should wrap at 20 chars";
        let wrapped = wrap_text(text, 20);
        for line in wrapped.lines() {
            assert!(line.len() <= 20);
        }
    }
}
