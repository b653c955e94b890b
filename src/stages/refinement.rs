use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::RefinementFailure;
use crate::llm::schemas::{refinement_schema, PlanResponse};
use crate::llm::{
    build_refinement_prompt, invoke_converted, validate_plan, GatewayRequest, LlmGateway,
    RetryPolicy, ValidationConfig, REFINEMENT_SYSTEM_PROMPT,
};
use crate::models::{
    Code, OverallEvaluation, RefinementOperation, RefinementPlan, RefinementRecord,
    SkippedOperation, Theme, ThemeDraft, ThemeSet,
};

/// Sampling temperature for refinement planning
pub const REFINEMENT_TEMPERATURE: f64 = 0.3;

/// Configuration for the refinement stage
#[derive(Debug, Clone, Default)]
pub struct RefinementConfig {
    pub validation: ValidationConfig,
    pub retry: RetryPolicy,
}

/// Result of applying a plan to a theme set
#[derive(Debug, Clone)]
pub struct Application {
    pub themes: ThemeSet,
    pub skipped: Vec<SkippedOperation>,
}

/// Plans refinement operations from evaluation feedback and applies them
pub struct RefinementStage {
    gateway: Arc<dyn LlmGateway>,
    config: RefinementConfig,
}

impl RefinementStage {
    pub fn new(gateway: Arc<dyn LlmGateway>, config: RefinementConfig) -> Self {
        Self { gateway, config }
    }

    /// Ask the model for one plan covering the whole theme set
    pub async fn refine(
        &self,
        themes: &ThemeSet,
        evaluation: &OverallEvaluation,
        codes: &[Code],
    ) -> Result<RefinementPlan, RefinementFailure> {
        let request = GatewayRequest {
            system: REFINEMENT_SYSTEM_PROMPT.to_string(),
            prompt: build_refinement_prompt(themes, evaluation, codes),
            response_schema: refinement_schema(),
            temperature: REFINEMENT_TEMPERATURE,
        };

        let plan = invoke_converted(
            self.gateway.as_ref(),
            &request,
            &self.config.retry,
            |r: PlanResponse| validate_plan(r, codes.len(), &self.config.validation),
        )
        .await
        .map_err(|source| RefinementFailure::Plan {
            theme_count: themes.len(),
            source,
        })?;

        info!(
            "Refinement plan: {} operations ({})",
            plan.operations.len(),
            plan.summary
        );

        Ok(plan)
    }

    /// Apply `plan` and record what happened
    ///
    /// A plan that would leave no themes is rejected.
    pub fn apply(
        &self,
        themes: &ThemeSet,
        plan: &RefinementPlan,
    ) -> Result<(ThemeSet, RefinementRecord), RefinementFailure> {
        let application = apply_plan(themes, plan);

        if application.themes.is_empty() {
            return Err(RefinementFailure::EmptyThemeSet {
                operation_count: plan.operations.len(),
            });
        }

        info!(
            "Refinement applied: {} -> {} themes, {} operations skipped",
            themes.len(),
            application.themes.len(),
            application.skipped.len()
        );

        let record = RefinementRecord {
            plan: plan.clone(),
            skipped: application.skipped,
            theme_count_before: themes.len(),
            theme_count_after: application.themes.len(),
        };

        Ok((application.themes, record))
    }
}

/// Apply a plan in DELETE, COMBINE, SPLIT, ADD order
///
/// Operations whose targets no longer exist are skipped and recorded rather
/// than failing the plan.
pub fn apply_plan(themes: &ThemeSet, plan: &RefinementPlan) -> Application {
    let mut working = themes.clone();
    let mut skipped = Vec::new();

    for operation in plan.in_application_order() {
        debug!("{}: {}", operation.kind(), operation.rationale());

        let outcome = match operation {
            RefinementOperation::Delete { targets, .. } => apply_delete(&mut working, targets),
            RefinementOperation::Combine {
                targets,
                merge_into,
                new_theme,
                ..
            } => apply_combine(&mut working, targets, merge_into.as_deref(), new_theme.as_ref()),
            RefinementOperation::Split {
                target, split_into, ..
            } => apply_split(&mut working, target, split_into),
            RefinementOperation::Add { new_theme, .. } => {
                let id = working.push(new_theme.clone());
                debug!("ADD: {} ({})", new_theme.name, id);
                Ok(())
            }
        };

        if let Err(reason) = outcome {
            warn!("Skipping {} operation: {}", operation.kind(), reason);
            skipped.push(SkippedOperation {
                operation: operation.clone(),
                reason,
            });
        }
    }

    Application {
        themes: working,
        skipped,
    }
}

fn apply_delete(themes: &mut ThemeSet, targets: &[String]) -> Result<(), String> {
    let mut removed = 0;
    for target in targets {
        match themes.remove(target) {
            Some(theme) => {
                debug!("DELETE: {} ({})", theme.name, target);
                removed += 1;
            }
            None => debug!("DELETE: {} already absent", target),
        }
    }

    if removed == 0 {
        return Err(format!("none of {:?} present", targets));
    }
    Ok(())
}

fn apply_combine(
    themes: &mut ThemeSet,
    targets: &[String],
    merge_into: Option<&str>,
    new_theme: Option<&ThemeDraft>,
) -> Result<(), String> {
    // Present targets in set order, so the merged code order does not
    // depend on how the model listed them
    let mut present: Vec<(usize, String)> = targets
        .iter()
        .filter_map(|id| themes.position(id).map(|pos| (pos, id.clone())))
        .collect();
    present.sort();
    present.dedup();

    if present.is_empty() {
        return Err(format!("none of {:?} present", targets));
    }
    if present.len() < 2 && new_theme.is_none() {
        return Err(format!(
            "only {} of {:?} present, nothing to merge",
            present[0].1, targets
        ));
    }
    if present.len() < targets.len() {
        debug!(
            "COMBINE: {} of {} targets present",
            present.len(),
            targets.len()
        );
    }

    let primary = merge_into
        .filter(|id| present.iter().any(|(_, p)| p.as_str() == *id))
        .map(str::to_string);

    match (primary, new_theme) {
        (Some(primary), _) => merge_into_primary(themes, &primary, &present),
        (None, Some(draft)) => merge_into_new(themes, &present, draft),
        (None, None) => {
            // Designated primary is gone, so the first present target absorbs the rest
            let (_, first) = &present[0];
            let first = first.clone();
            merge_into_primary(themes, &first, &present)
        }
    }

    Ok(())
}

fn merge_into_primary(themes: &mut ThemeSet, primary: &str, present: &[(usize, String)]) {
    let mut absorbed: Vec<Theme> = Vec::new();
    for (_, id) in present {
        if id != primary {
            if let Some(theme) = themes.remove(id) {
                absorbed.push(theme);
            }
        }
    }

    if let Some(target) = themes.get_mut(primary) {
        for theme in &absorbed {
            extend_unique(&mut target.code_ids, &theme.code_ids);
        }
        debug!(
            "COMBINE: {} theme(s) merged into {} ({} codes)",
            absorbed.len(),
            primary,
            target.code_ids.len()
        );
    }
}

fn merge_into_new(themes: &mut ThemeSet, present: &[(usize, String)], draft: &ThemeDraft) {
    let insert_at = present[0].0;
    let mut code_ids = Vec::new();
    for (_, id) in present {
        if let Some(theme) = themes.remove(id) {
            extend_unique(&mut code_ids, &theme.code_ids);
        }
    }
    extend_unique(&mut code_ids, &draft.code_ids);

    let merged = themes.create(ThemeDraft {
        name: draft.name.clone(),
        description: draft.description.clone(),
        code_ids,
    });
    debug!(
        "COMBINE: {} theme(s) merged into new {} ({})",
        present.len(),
        merged.theme_id,
        merged.name
    );
    themes.insert(insert_at, merged);
}

fn apply_split(themes: &mut ThemeSet, target: &str, parts: &[ThemeDraft]) -> Result<(), String> {
    let position = themes
        .position(target)
        .ok_or_else(|| format!("{} not present", target))?;
    let original = themes
        .remove(target)
        .ok_or_else(|| format!("{} not present", target))?;

    for (offset, part) in parts.iter().enumerate() {
        let (kept, dropped): (Vec<usize>, Vec<usize>) = part
            .code_ids
            .iter()
            .copied()
            .partition(|id| original.code_ids.contains(id));
        if !dropped.is_empty() {
            debug!(
                "SPLIT: {} ignoring codes {:?} not held by {}",
                part.name, dropped, target
            );
        }

        let theme = themes.create(ThemeDraft {
            name: part.name.clone(),
            description: part.description.clone(),
            code_ids: kept,
        });
        themes.insert(position + offset, theme);
    }

    debug!("SPLIT: {} into {} themes", target, parts.len());
    Ok(())
}

fn extend_unique(into: &mut Vec<usize>, from: &[usize]) {
    for &id in from {
        if !into.contains(&id) {
            into.push(id);
        }
    }
}
