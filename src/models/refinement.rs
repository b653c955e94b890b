use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::ThemeDraft;

/// Kind of refinement operation
///
/// Variant order is the application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Delete,
    Combine,
    Split,
    Add,
}

impl OperationKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "delete" => Some(OperationKind::Delete),
            "combine" => Some(OperationKind::Combine),
            "split" => Some(OperationKind::Split),
            "add" => Some(OperationKind::Add),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Delete => "DELETE",
            OperationKind::Combine => "COMBINE",
            OperationKind::Split => "SPLIT",
            OperationKind::Add => "ADD",
        };
        f.write_str(name)
    }
}

/// A single change to the working theme set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefinementOperation {
    /// Remove the targets
    Delete {
        targets: Vec<String>,
        rationale: String,
    },
    /// Merge the targets' codes into `merge_into` (one of the targets) or
    /// into a new theme built from `new_theme`
    Combine {
        targets: Vec<String>,
        rationale: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        merge_into: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_theme: Option<ThemeDraft>,
    },
    /// Replace the target with the `split_into` themes
    Split {
        target: String,
        rationale: String,
        split_into: Vec<ThemeDraft>,
    },
    /// Append a new theme
    Add {
        rationale: String,
        new_theme: ThemeDraft,
    },
}

impl RefinementOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            RefinementOperation::Delete { .. } => OperationKind::Delete,
            RefinementOperation::Combine { .. } => OperationKind::Combine,
            RefinementOperation::Split { .. } => OperationKind::Split,
            RefinementOperation::Add { .. } => OperationKind::Add,
        }
    }

    pub fn rationale(&self) -> &str {
        match self {
            RefinementOperation::Delete { rationale, .. }
            | RefinementOperation::Combine { rationale, .. }
            | RefinementOperation::Split { rationale, .. }
            | RefinementOperation::Add { rationale, .. } => rationale,
        }
    }

    /// Theme ids this operation refers to
    pub fn targets(&self) -> Vec<&str> {
        match self {
            RefinementOperation::Delete { targets, .. }
            | RefinementOperation::Combine { targets, .. } => {
                targets.iter().map(String::as_str).collect()
            }
            RefinementOperation::Split { target, .. } => vec![target.as_str()],
            RefinementOperation::Add { .. } => vec![],
        }
    }

    /// Ordering key among operations of the same kind
    ///
    /// Target order inside an operation does not affect the key.
    fn canonical_key(&self) -> String {
        let mut normalized = self.clone();
        if let RefinementOperation::Delete { targets, .. }
        | RefinementOperation::Combine { targets, .. } = &mut normalized
        {
            targets.sort();
            targets.dedup();
        }
        format!("{:?}", normalized)
    }
}

/// Operations proposed for one iteration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementPlan {
    pub operations: Vec<RefinementOperation>,
    #[serde(default)]
    pub summary: String,
}

impl RefinementPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn count(&self, kind: OperationKind) -> usize {
        self.operations.iter().filter(|op| op.kind() == kind).count()
    }

    /// Operations in application order: DELETE, COMBINE, SPLIT, ADD
    ///
    /// Operations of the same kind are ordered by content, so the order the
    /// model listed them in never changes the result.
    pub fn in_application_order(&self) -> Vec<&RefinementOperation> {
        let mut ordered: Vec<(OperationKind, String, &RefinementOperation)> = self
            .operations
            .iter()
            .map(|op| (op.kind(), op.canonical_key(), op))
            .collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        ordered.into_iter().map(|(_, _, op)| op).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete(target: &str) -> RefinementOperation {
        RefinementOperation::Delete {
            targets: vec![target.to_string()],
            rationale: "irrelevant".to_string(),
        }
    }

    fn add(name: &str) -> RefinementOperation {
        RefinementOperation::Add {
            rationale: "missing pattern".to_string(),
            new_theme: ThemeDraft {
                name: name.to_string(),
                description: "new".to_string(),
                code_ids: vec![],
            },
        }
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(OperationKind::parse("DELETE"), Some(OperationKind::Delete));
        assert_eq!(OperationKind::parse(" combine "), Some(OperationKind::Combine));
        assert_eq!(OperationKind::parse("rename"), None);
    }

    #[test]
    fn test_application_order_by_kind() {
        let plan = RefinementPlan {
            operations: vec![
                add("x"),
                RefinementOperation::Split {
                    target: "theme_1".to_string(),
                    rationale: "two concepts".to_string(),
                    split_into: vec![],
                },
                delete("theme_2"),
                RefinementOperation::Combine {
                    targets: vec!["theme_3".to_string(), "theme_4".to_string()],
                    rationale: "overlap".to_string(),
                    merge_into: Some("theme_3".to_string()),
                    new_theme: None,
                },
            ],
            summary: String::new(),
        };

        let kinds: Vec<OperationKind> =
            plan.in_application_order().iter().map(|op| op.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                OperationKind::Delete,
                OperationKind::Combine,
                OperationKind::Split,
                OperationKind::Add
            ]
        );
    }

    #[test]
    fn test_same_kind_order_is_canonical() {
        let forward = RefinementPlan {
            operations: vec![add("b"), delete("theme_1"), add("a")],
            summary: String::new(),
        };
        let backward = RefinementPlan {
            operations: vec![add("a"), add("b"), delete("theme_1")],
            summary: String::new(),
        };

        assert_eq!(forward.in_application_order(), backward.in_application_order());
    }

    #[test]
    fn test_operation_serializes_with_kind_tag() {
        let value = serde_json::to_value(delete("theme_0")).unwrap();
        assert_eq!(value["kind"], "delete");
        assert_eq!(value["targets"][0], "theme_0");
    }
}
