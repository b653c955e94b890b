use std::collections::HashMap;

use crate::models::{
    Chunk, Code, Criterion, EvaluationCriteria, OverallEvaluation, Theme, ThemeSet,
};

/// System prompt for code extraction and theme synthesis
pub const GENERATION_SYSTEM_PROMPT: &str = r#"You are a qualitative research expert specializing in thematic analysis of interview transcripts.

RULES:
1. Work only from the material you are given. Do not invent quotes or events.
2. Codes are short observations (fewer than 25 words) capturing one meaningful unit of information.
3. Themes group related codes into a broader pattern with a clear name and a description of about 25 words.
4. Always answer through the provided tool, matching its schema exactly."#;

/// System prompt for theme evaluation
pub const EVALUATION_SYSTEM_PROMPT: &str = r#"You are a qualitative research expert evaluating themes from a thematic analysis of interview transcripts.

Score each criterion with an integer from 1 (poor) to 5 (excellent) and explain every score.
Suggest concrete improvements for any criterion scored below 4.
Always answer through the provided tool, matching its schema exactly."#;

/// System prompt for refinement planning
pub const REFINEMENT_SYSTEM_PROMPT: &str = r#"You are a qualitative research expert refining themes based on evaluation feedback.

OPERATIONS (use only these):
- delete: remove themes that are irrelevant or do not reflect the data
- combine: merge repeated or overlapping themes into one
- split: replace a theme holding several concepts with two or more distinct themes
- add: introduce an important pattern from the codes that no theme covers

Operations are applied in the order delete, combine, split, add.
Refer to existing themes only by their theme id.
Always answer through the provided tool, matching its schema exactly."#;

/// Build the user prompt for extracting codes from one chunk
pub fn build_coding_prompt(chunk: &Chunk, max_code_words: usize) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "# Chunk {} (words {}-{})\n\n",
        chunk.chunk_id, chunk.start_word, chunk.end_word
    ));
    prompt.push_str("## Instructions\n");
    prompt.push_str("- Identify key patterns, concepts, and ideas expressed in the text\n");
    prompt.push_str(&format!(
        "- Each code must be a concise description of fewer than {} words\n",
        max_code_words
    ));
    prompt.push_str("- Focus on participants' experiences, emotions, concerns, and perspectives\n\n");

    prompt.push_str("## Transcript\n");
    prompt.push_str(&chunk.text);
    prompt.push_str("\n\nSubmit the codes using the submit_codes tool.");

    prompt
}

fn format_codes(codes: &[Code]) -> String {
    codes
        .iter()
        .map(|c| format!("[{}] {}", c.code_id, c.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the user prompt for synthesizing themes from all codes
pub fn build_themes_prompt(codes: &[Code], max_description_words: usize) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("# Codes ({})\n", codes.len()));
    prompt.push_str(&format_codes(codes));
    prompt.push_str("\n\n## Instructions\n");
    prompt.push_str("- Group related codes into broader themes\n");
    prompt.push_str("- Give each theme a clear, descriptive name\n");
    prompt.push_str(&format!(
        "- Describe each theme in approximately 25 words (never more than {})\n",
        max_description_words
    ));
    prompt.push_str("- Keep themes distinct from each other\n");
    prompt.push_str("- List the bracketed ids of the codes each theme encompasses in code_ids\n\n");
    prompt.push_str("Submit the themes using the submit_themes tool.");

    prompt
}

fn theme_codes<'a>(theme: &Theme, by_id: &HashMap<usize, &'a Code>) -> Vec<&'a Code> {
    theme
        .code_ids
        .iter()
        .filter_map(|id| by_id.get(id).copied())
        .collect()
}

/// Build the user prompt for scoring one theme
pub fn build_evaluation_prompt(
    theme: &Theme,
    themes: &ThemeSet,
    codes: &[Code],
    criteria: &EvaluationCriteria,
) -> String {
    let by_id: HashMap<usize, &Code> = codes.iter().map(|c| (c.code_id, c)).collect();
    let mut prompt = String::new();

    prompt.push_str("# Criteria\n");
    for (index, criterion) in Criterion::ALL.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {}: {}\n",
            index + 1,
            criterion.name().to_uppercase(),
            criteria.description(*criterion)
        ));
    }

    prompt.push_str("\n# Theme To Evaluate\n");
    prompt.push_str(&format!("Name: {}\n", theme.name));
    prompt.push_str(&format!("Description: {}\n", theme.description));
    prompt.push_str("Associated codes:\n");
    for code in theme_codes(theme, &by_id) {
        prompt.push_str(&format!("- {}\n", code.text));
    }

    prompt.push_str("\n## Other Themes (for distinctiveness)\n");
    let others: Vec<&Theme> = themes
        .iter()
        .filter(|t| t.theme_id != theme.theme_id)
        .collect();
    if others.is_empty() {
        prompt.push_str("(none)\n");
    }
    for other in others {
        prompt.push_str(&format!("- {}: {}\n", other.name, other.description));
    }

    prompt.push_str("\n## All Codes (for coverage)\n");
    prompt.push_str(&format_codes(codes));
    prompt.push_str("\n\nSubmit the scores using the submit_evaluation tool.");

    prompt
}

/// Build the user prompt for planning a refinement round
pub fn build_refinement_prompt(
    themes: &ThemeSet,
    evaluation: &OverallEvaluation,
    codes: &[Code],
) -> String {
    let mut prompt = String::new();

    prompt.push_str("# Current Themes\n");
    for theme in themes.iter() {
        prompt.push_str(&format!(
            "- {} | {}: {} (codes: {:?})\n",
            theme.theme_id, theme.name, theme.description, theme.code_ids
        ));
    }

    prompt.push_str("\n# Evaluation Results\n");
    for result in &evaluation.results {
        prompt.push_str(&format!(
            "## {} ({}) - mean {:.2}\n",
            result.theme_id,
            result.theme_name,
            result.mean_score()
        ));
        prompt.push_str(&format!(
            "- coverage {}: {}\n- actionability {}: {}\n- distinctiveness {}: {}\n- relevance {}: {}\n",
            result.coverage,
            result.feedback.coverage,
            result.actionability,
            result.feedback.actionability,
            result.distinctiveness,
            result.feedback.distinctiveness,
            result.relevance,
            result.feedback.relevance
        ));
        if !result.refinement_suggestions.is_empty() {
            prompt.push_str(&format!(
                "- suggestions: {}\n",
                result.refinement_suggestions.join("; ")
            ));
        }
    }

    prompt.push_str("\n# Global Feedback\n");
    prompt.push_str(&evaluation.global_feedback);

    prompt.push_str("\n\n# Codes\n");
    prompt.push_str(&format_codes(codes));

    prompt.push_str("\n\n## Instructions\n");
    prompt.push_str("- Address every criterion scored below 4\n");
    prompt.push_str("- delete: list the theme ids to remove in targets\n");
    prompt.push_str(
        "- combine: list two or more theme ids in targets and either name one of them in merge_into or provide new_theme (not both)\n",
    );
    prompt.push_str("- split: one theme id in targets and two or three split_into themes, assigning its code ids between them\n");
    prompt.push_str("- add: no targets and a new_theme built from codes no theme covers\n");
    prompt.push_str("- Return an empty operations list if no change would improve the themes\n\n");
    prompt.push_str("Submit the plan using the submit_refinement_plan tool.");

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CriterionFeedback, EvaluationResult, ThemeDraft};

    fn codes() -> Vec<Code> {
        vec![
            Code {
                code_id: 0,
                text: "Fear of sudden cardiac events".to_string(),
                source_chunk_id: 0,
            },
            Code {
                code_id: 1,
                text: "Frustration with conflicting advice".to_string(),
                source_chunk_id: 0,
            },
        ]
    }

    fn themes() -> ThemeSet {
        ThemeSet::from_drafts(vec![
            ThemeDraft {
                name: "Living with fear".to_string(),
                description: "Parents describe constant worry".to_string(),
                code_ids: vec![0],
            },
            ThemeDraft {
                name: "Information gaps".to_string(),
                description: "Parents receive inconsistent guidance".to_string(),
                code_ids: vec![1],
            },
        ])
    }

    #[test]
    fn test_evaluation_prompt_contents() {
        let themes = themes();
        let theme = &themes.themes()[0];
        let mut criteria = EvaluationCriteria::default();
        criteria.relevance = "Must reflect caregiver needs".to_string();

        let prompt = build_evaluation_prompt(theme, &themes, &codes(), &criteria);

        assert!(prompt.contains("RELEVANCE: Must reflect caregiver needs"));
        assert!(prompt.contains("Name: Living with fear"));
        assert!(prompt.contains("- Fear of sudden cardiac events"));
        assert!(prompt.contains("- Information gaps: Parents receive inconsistent guidance"));
        assert!(!prompt.contains("- Living with fear:"));
        assert!(prompt.contains("[1] Frustration with conflicting advice"));
    }

    #[test]
    fn test_refinement_prompt_lists_ids_and_scores() {
        let themes = themes();
        let evaluation = OverallEvaluation::from_results(vec![EvaluationResult {
            theme_id: "theme_0".to_string(),
            theme_name: "Living with fear".to_string(),
            coverage: 3,
            actionability: 4,
            distinctiveness: 2,
            relevance: 5,
            feedback: CriterionFeedback {
                distinctiveness: "Overlaps with information gaps".to_string(),
                ..Default::default()
            },
            needs_refinement: true,
            refinement_suggestions: vec!["Merge with theme_1".to_string()],
        }]);

        let prompt = build_refinement_prompt(&themes, &evaluation, &codes());

        assert!(prompt.contains("- theme_0 | Living with fear"));
        assert!(prompt.contains("distinctiveness 2: Overlaps with information gaps"));
        assert!(prompt.contains("suggestions: Merge with theme_1"));
        assert!(prompt.contains(&evaluation.global_feedback));
    }

    #[test]
    fn test_coding_prompt_includes_chunk_text() {
        let chunk = Chunk {
            chunk_id: 1,
            text: "We were told he could not play soccer.".to_string(),
            word_count: 8,
            start_word: 100,
            end_word: 108,
        };
        let prompt = build_coding_prompt(&chunk, 25);
        assert!(prompt.contains("# Chunk 1 (words 100-108)"));
        assert!(prompt.contains("fewer than 25 words"));
        assert!(prompt.contains("could not play soccer"));
    }
}
