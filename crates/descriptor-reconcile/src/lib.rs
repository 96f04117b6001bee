//! Descriptor reconciliation
//!
//! Compares a declared descriptor document with one sample record, repairs
//! what it can and says whether the descriptor is acceptable.
//!
//! ```text
//! for each sample field k:
//!   missing in descriptor   → add autofixed entry        (MissingField)
//!   entry malformed         → replace with autofixed one (InvalidDescriptor)
//!   declared ≠ inferred     → overwrite dataSchema       (TypeMismatch)
//!   description lacks k     → flag only                  (DescriptionMismatch)
//! ```
//!
//! Number and Integer satisfy each other. Severity comes from a
//! [`SeverityPolicy`]; the evaluation is rejected iff any issue is critical.

pub mod config;
pub mod description;
pub mod engine;
pub mod error;
pub mod report;
pub mod severity;

pub use config::ReconcilerConfig;
pub use description::is_description_apt;
pub use engine::{reconcile, Reconciler};
pub use error::ReconcileError;
pub use report::{
    ClassificationWarning, EvaluationReport, EvaluationResult, EvaluationStatus, FieldIssue,
    FieldReport, FieldStatus, FieldVerdict, IssueKind,
};
pub use severity::{ExemptFields, Severity, SeverityPolicy};

use std::collections::HashMap;

/// Build a reconciler around a classifier backend chosen by name.
///
/// See [`descriptor_infer::create_classifier`] for backends and settings.
pub fn create_reconciler(
    backend: &str,
    settings: &HashMap<String, String>,
    config: ReconcilerConfig,
) -> anyhow::Result<Reconciler> {
    let oracle = descriptor_infer::create_classifier(backend, settings)?;
    Ok(Reconciler::with_config(oracle, config))
}
