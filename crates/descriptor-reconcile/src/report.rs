//! Evaluation results and the serialized report.

use crate::severity::Severity;
use descriptor_model::{DescriptorDocument, ResourceKind, SemanticTypeTag};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Field Verdicts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    MissingField,
    InvalidDescriptor,
    TypeMismatch,
    DescriptionMismatch,
}

/// One discrepancy found on a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
}

impl FieldIssue {
    pub fn missing_field(severity: Severity, inferred: SemanticTypeTag) -> Self {
        Self {
            kind: IssueKind::MissingField,
            severity,
            message: format!("missing field, added with inferred type {inferred}"),
        }
    }

    pub fn invalid_descriptor(
        severity: Severity,
        inferred: SemanticTypeTag,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self {
            kind: IssueKind::InvalidDescriptor,
            severity,
            message: format!("invalid descriptor, autofixed to {inferred} ({cause})"),
        }
    }

    pub fn type_mismatch(
        severity: Severity,
        declared: SemanticTypeTag,
        inferred: SemanticTypeTag,
    ) -> Self {
        Self {
            kind: IssueKind::TypeMismatch,
            severity,
            message: format!("type mismatch ({declared} ≠ {inferred})"),
        }
    }

    /// Never critical.
    pub fn description_mismatch() -> Self {
        Self {
            kind: IssueKind::DescriptionMismatch,
            severity: Severity::NonCritical,
            message: "description does not match key semantics".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldStatus {
    Accepted,
    Rejected,
    Autofixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldVerdict {
    pub status: FieldStatus,
    /// Tag the classifier produced for the sample value
    pub inferred: SemanticTypeTag,
    pub issues: Vec<FieldIssue>,
    pub autocorrected: bool,
}

impl FieldVerdict {
    /// Derive the status from the issues found and whether a fix was applied.
    pub fn new(inferred: SemanticTypeTag, issues: Vec<FieldIssue>, autocorrected: bool) -> Self {
        let rejected = issues.iter().any(|issue| {
            issue.severity.is_critical() || issue.kind == IssueKind::DescriptionMismatch
        });
        let status = if rejected {
            FieldStatus::Rejected
        } else if autocorrected {
            FieldStatus::Autofixed
        } else {
            FieldStatus::Accepted
        };

        Self {
            status,
            inferred,
            issues,
            autocorrected,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.issues.iter().any(|issue| issue.severity.is_critical())
    }

    /// Issue messages joined with `"; "`.
    pub fn reason(&self) -> Option<String> {
        if self.issues.is_empty() {
            return None;
        }
        Some(
            self.issues
                .iter()
                .map(|issue| issue.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

// ============================================================================
// Evaluation Result
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluationStatus {
    #[serde(rename = "ACCEPTED")]
    Accepted,
    #[serde(rename = "REJECTED")]
    Rejected,
}

/// A classification that fell back to `iudx:Text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationWarning {
    pub field: String,
    pub reason: String,
}

/// Outcome of one evaluation call.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub status: EvaluationStatus,
    pub fields: BTreeMap<String, FieldVerdict>,
    /// The corrected descriptor, in the layout it was read
    pub descriptor: DescriptorDocument,
    pub warnings: Vec<ClassificationWarning>,
    pub resource_kind: Option<ResourceKind>,
}

impl EvaluationResult {
    pub fn is_accepted(&self) -> bool {
        self.status == EvaluationStatus::Accepted
    }

    /// Fields the engine corrected, in key order.
    pub fn changes(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, verdict)| verdict.autocorrected)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn corrected_descriptor(&self) -> Value {
        self.descriptor.to_value()
    }

    pub fn report(&self) -> EvaluationReport {
        EvaluationReport {
            status: self.status,
            fields: self
                .fields
                .iter()
                .map(|(name, verdict)| {
                    (
                        name.clone(),
                        FieldReport {
                            status: verdict.status,
                            reason: verdict.reason(),
                            autocorrected: verdict.autocorrected.then_some(true),
                        },
                    )
                })
                .collect(),
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Serializable summary of an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub status: EvaluationStatus,
    pub fields: BTreeMap<String, FieldReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReport {
    pub status: FieldStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autocorrected: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_status_derivation() {
        let accepted = FieldVerdict::new(SemanticTypeTag::Text, vec![], false);
        assert_eq!(accepted.status, FieldStatus::Accepted);
        assert_eq!(accepted.reason(), None);

        let exempt = FieldVerdict::new(
            SemanticTypeTag::Text,
            vec![FieldIssue::missing_field(Severity::NonCritical, SemanticTypeTag::Text)],
            true,
        );
        assert_eq!(exempt.status, FieldStatus::Autofixed);
        assert!(!exempt.is_critical());

        let critical = FieldVerdict::new(
            SemanticTypeTag::Point,
            vec![FieldIssue::type_mismatch(
                Severity::Critical,
                SemanticTypeTag::Text,
                SemanticTypeTag::Point,
            )],
            true,
        );
        assert_eq!(critical.status, FieldStatus::Rejected);
        assert_eq!(
            critical.reason().as_deref(),
            Some("type mismatch (iudx:Text ≠ iudx:Point)")
        );

        let flagged = FieldVerdict::new(
            SemanticTypeTag::Text,
            vec![FieldIssue::description_mismatch()],
            false,
        );
        assert_eq!(flagged.status, FieldStatus::Rejected);
        assert!(!flagged.is_critical());
    }

    #[test]
    fn test_report_serialization() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "filename".to_string(),
            FieldVerdict::new(
                SemanticTypeTag::Text,
                vec![FieldIssue::missing_field(Severity::NonCritical, SemanticTypeTag::Text)],
                true,
            ),
        );
        fields.insert(
            "name".to_string(),
            FieldVerdict::new(SemanticTypeTag::Text, vec![], false),
        );

        let result = EvaluationResult {
            status: EvaluationStatus::Accepted,
            fields,
            descriptor: DescriptorDocument::empty(),
            warnings: vec![],
            resource_kind: None,
        };
        assert_eq!(result.changes(), vec!["filename"]);

        let report = serde_json::to_value(result.report()).unwrap();
        assert_eq!(
            report,
            json!({
                "status": "ACCEPTED",
                "fields": {
                    "filename": {
                        "status": "Autofixed",
                        "reason": "missing field, added with inferred type iudx:Text",
                        "autocorrected": true
                    },
                    "name": {"status": "Accepted"}
                }
            })
        );
    }
}
