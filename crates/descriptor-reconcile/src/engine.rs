//! The reconciler
//!
//! An evaluation runs in two phases:
//!
//! ```text
//!  descriptor ──► DescriptorDocument ─────────────────┐
//!                                                     ▼
//!  sample ──► Sample ──► infer_all ──► inferences ──► reconcile ──► EvaluationResult
//!                        (async, may                  (pure, sync)
//!                         run in a pool)
//! ```
//!
//! Phase 1 asks the classifier for every sample field. It never fails:
//! timeouts and crashed tasks become Text fallbacks in both the sequential
//! and the pooled mode. Phase 2 compares each
//! field against the declared descriptor, corrects what it can and derives
//! the verdicts. It is a plain function of its inputs.

use crate::config::ReconcilerConfig;
use crate::description::is_description_apt;
use crate::error::ReconcileError;
use crate::report::{
    ClassificationWarning, EvaluationResult, EvaluationStatus, FieldIssue, FieldVerdict,
};
use crate::severity::{ExemptFields, Severity, SeverityPolicy};
use descriptor_infer::{Inference, TypeOracle};
use descriptor_model::{
    is_reserved_key, DescriptorDocument, FieldDescriptor, ResourceKind, Sample, SemanticTypeTag,
    AUTOFIXED_DESCRIPTION,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub struct Reconciler {
    oracle: Arc<dyn TypeOracle>,
    policy: Arc<dyn SeverityPolicy>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(oracle: Arc<dyn TypeOracle>) -> Self {
        Self::with_config(oracle, ReconcilerConfig::default())
    }

    /// The severity policy exempts the configured identifier key.
    pub fn with_config(oracle: Arc<dyn TypeOracle>, config: ReconcilerConfig) -> Self {
        let policy = ExemptFields::new([config.identifier_key.clone()]);
        Self {
            oracle,
            policy: Arc::new(policy),
            config,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn SeverityPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Evaluate a descriptor document against one sample.
    ///
    /// Fails only when either document is not shaped as expected.
    pub async fn evaluate(
        &self,
        descriptor: &Value,
        sample: &Value,
    ) -> Result<EvaluationResult, ReconcileError> {
        let document =
            DescriptorDocument::from_value(descriptor.clone(), self.config.layout.clone())?;
        let flat = Sample::flatten_with_identifier(sample, &self.config.identifier_key)?;

        let inferences = self.infer_all(&flat).await;
        let mut result = reconcile(
            document,
            &flat,
            &inferences,
            self.policy.as_ref(),
            &self.config,
        );

        let identifier = flat.identifier(&self.config.identifier_key);
        result.resource_kind = Some(ResourceKind::detect(sample, identifier.as_deref()));

        tracing::info!(
            classifier = %self.oracle.name(),
            status = ?result.status,
            fields = result.fields.len(),
            changes = result.changes().len(),
            warnings = result.warnings.len(),
            "descriptor evaluated"
        );

        Ok(result)
    }

    /// Classify every reconcilable sample field.
    pub async fn infer_all(&self, sample: &Sample) -> HashMap<String, Inference> {
        let fields: Vec<(String, Value)> = sample
            .iter()
            .filter(|(field, _)| !is_reserved_key(field))
            .map(|(field, value)| (field.to_string(), value.clone()))
            .collect();
        let timeout = self.config.classify_timeout();
        let permits = self.config.max_concurrency.clamp(1, Semaphore::MAX_PERMITS);

        // One task per field, awaited in sample order.
        if permits == 1 {
            let mut inferences = HashMap::with_capacity(fields.len());
            for (field, value) in fields {
                let oracle = Arc::clone(&self.oracle);
                let name = field.clone();
                let task = tokio::spawn(async move {
                    classify_bounded(oracle.as_ref(), &name, &value, timeout).await
                });
                let inference = task.await.unwrap_or_else(|err| {
                    tracing::warn!(field = %field, error = %err, "classification task failed");
                    Inference::fallback("classification task failed")
                });
                inferences.insert(field, inference);
            }
            return inferences;
        }

        let semaphore = Arc::new(Semaphore::new(permits));
        let mut set = JoinSet::new();

        for (field, value) in fields.iter().cloned() {
            let oracle = Arc::clone(&self.oracle);
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let inference = match semaphore.acquire_owned().await {
                    Ok(_permit) => classify_bounded(oracle.as_ref(), &field, &value, timeout).await,
                    Err(_) => Inference::fallback("classifier pool closed"),
                };
                (field, inference)
            });
        }

        let mut inferences = HashMap::with_capacity(fields.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((field, inference)) => {
                    inferences.insert(field, inference);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "classification task failed");
                }
            }
        }

        // A task that died took its field name with it.
        for (field, _) in fields {
            inferences
                .entry(field)
                .or_insert_with(|| Inference::fallback("classification task failed"));
        }

        inferences
    }
}

async fn classify_bounded(
    oracle: &dyn TypeOracle,
    field: &str,
    value: &Value,
    timeout: Option<Duration>,
) -> Inference {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, oracle.classify(field, value))
            .await
            .unwrap_or_else(|_| {
                Inference::fallback(format!("classification timed out after {limit:?}"))
            }),
        None => oracle.classify(field, value).await,
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Reconcile a descriptor against a sample given precomputed inferences.
///
/// Sample fields are processed in sample order. Fields declared but absent
/// from the sample are left untouched. Sample keys that collide with
/// reserved descriptor metadata are skipped. A field with no inference is
/// treated as a Text fallback.
pub fn reconcile(
    mut document: DescriptorDocument,
    sample: &Sample,
    inferences: &HashMap<String, Inference>,
    policy: &dyn SeverityPolicy,
    config: &ReconcilerConfig,
) -> EvaluationResult {
    let mut fields = BTreeMap::new();
    let mut warnings = Vec::new();

    for (field, _) in sample.iter() {
        if is_reserved_key(field) {
            tracing::warn!(field = %field, "sample key collides with descriptor metadata; skipped");
            continue;
        }

        let inference = inferences
            .get(field)
            .cloned()
            .unwrap_or_else(|| Inference::fallback("no inference supplied"));
        if let Some(reason) = &inference.fallback {
            tracing::warn!(
                field = %field,
                reason = %reason,
                "classification fell back to iudx:Text"
            );
            warnings.push(ClassificationWarning {
                field: field.to_string(),
                reason: reason.clone(),
            });
        }

        let verdict = reconcile_field(
            &mut document,
            field,
            inference.tag,
            policy.severity(field),
            config,
        );
        fields.insert(field.to_string(), verdict);
    }

    if let Some(name) = sample.identifier(&config.identifier_key) {
        document.relabel_for(&name);
    }

    let status = if fields.values().any(FieldVerdict::is_critical) {
        EvaluationStatus::Rejected
    } else {
        EvaluationStatus::Accepted
    };

    EvaluationResult {
        status,
        fields,
        descriptor: document,
        warnings,
        resource_kind: None,
    }
}

fn reconcile_field(
    document: &mut DescriptorDocument,
    field: &str,
    inferred: SemanticTypeTag,
    severity: Severity,
    config: &ReconcilerConfig,
) -> FieldVerdict {
    let Some(entry) = document.field(field) else {
        document.set_field(field, &FieldDescriptor::autofixed(inferred));
        let issues = vec![FieldIssue::missing_field(severity, inferred)];
        return FieldVerdict::new(inferred, issues, true);
    };

    match FieldDescriptor::validate(entry) {
        Err(failure) => {
            let kept = config
                .preserve_descriptions
                .then(|| meaningful_description(entry))
                .flatten();
            let replacement = match kept {
                Some(description) => FieldDescriptor::with_description(inferred, &description),
                None => FieldDescriptor::autofixed(inferred),
            };
            document.set_field(field, &replacement);
            FieldVerdict::new(
                inferred,
                vec![FieldIssue::invalid_descriptor(severity, inferred, failure)],
                true,
            )
        }
        Ok(declared) => {
            let mut issues = Vec::new();
            let mut corrected = false;

            if !SemanticTypeTag::satisfies(declared.data_schema, inferred) {
                document.set_data_schema(field, inferred);
                issues.push(FieldIssue::type_mismatch(severity, declared.data_schema, inferred));
                corrected = true;
            }
            if config.check_descriptions && !is_description_apt(field, &declared.description) {
                issues.push(FieldIssue::description_mismatch());
            }

            FieldVerdict::new(inferred, issues, corrected)
        }
    }
}

/// The description of an invalid entry, if worth keeping.
fn meaningful_description(entry: &Value) -> Option<String> {
    let description = entry.get("description")?.as_str()?;
    let meaningful = description.chars().any(char::is_alphabetic)
        && !description.to_lowercase().contains(AUTOFIXED_DESCRIPTION);
    meaningful.then(|| description.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{FieldStatus, IssueKind};
    use async_trait::async_trait;
    use descriptor_infer::RuleBasedClassifier;
    use serde_json::json;

    /// Answers from a fixed table, Text fallback otherwise.
    struct TableOracle(HashMap<&'static str, SemanticTypeTag>);

    #[async_trait]
    impl TypeOracle for TableOracle {
        async fn classify(&self, field: &str, _value: &Value) -> Inference {
            match self.0.get(field) {
                Some(tag) => Inference::confident(*tag),
                None => Inference::fallback("not in table"),
            }
        }

        fn name(&self) -> &str {
            "table"
        }
    }

    fn rules() -> Reconciler {
        Reconciler::new(Arc::new(RuleBasedClassifier::new()))
    }

    fn entry(description: &str, tag: &str) -> Value {
        json!({"type": ["ValueDescriptor"], "description": description, "dataSchema": tag})
    }

    #[tokio::test]
    async fn test_missing_fields_are_added() {
        let sample = json!({
            "name": "Kali Temple",
            "geometry": {"type": "Point", "coordinates": [76.4, 29.1]}
        });
        let result = rules().evaluate(&json!({}), &sample).await.unwrap();

        assert_eq!(result.status, EvaluationStatus::Rejected);
        let descriptor = result.corrected_descriptor();
        assert_eq!(descriptor["name"], entry("autofixed", "iudx:Text"));
        assert_eq!(descriptor["geometry"]["dataSchema"], "iudx:Point");
        assert_eq!(result.fields["name"].issues[0].kind, IssueKind::MissingField);
        assert_eq!(result.changes(), vec!["geometry", "name"]);
    }

    #[tokio::test]
    async fn test_type_mismatch_overwrites_schema_only() {
        let descriptor = json!({"name": entry("Name of the temple", "iudx:Number")});
        let result = rules()
            .evaluate(&descriptor, &json!({"name": "Kali Temple"}))
            .await
            .unwrap();

        assert_eq!(result.status, EvaluationStatus::Rejected);
        let verdict = &result.fields["name"];
        assert_eq!(verdict.status, FieldStatus::Rejected);
        assert_eq!(
            verdict.reason().as_deref(),
            Some("type mismatch (iudx:Number ≠ iudx:Text)")
        );
        assert_eq!(
            result.corrected_descriptor()["name"],
            entry("Name of the temple", "iudx:Text")
        );
    }

    #[tokio::test]
    async fn test_numeric_subsumption_accepts_both_ways() {
        let descriptor = json!({
            "count": entry("count of visitors", "iudx:Number"),
            "latitude": entry("latitude of site", "iudx:Integer")
        });
        let sample = json!({"count": 12, "latitude": 28.6139});
        let result = rules().evaluate(&descriptor, &sample).await.unwrap();

        assert!(result.is_accepted());
        assert!(result.changes().is_empty());
        assert_eq!(result.corrected_descriptor(), descriptor);
    }

    #[tokio::test]
    async fn test_invalid_descriptor_is_replaced() {
        let descriptor = json!({
            "name": {"type": "ValueDescriptor", "description": "Name of the temple", "dataSchema": "iudx:Text"},
            "pm10": {"type": ["ValueDescriptor"], "description": "pm10 level", "dataSchema": "Number"}
        });
        let sample = json!({"name": "Kali Temple", "pm10": 41.5});
        let result = rules().evaluate(&descriptor, &sample).await.unwrap();

        assert_eq!(result.status, EvaluationStatus::Rejected);
        let corrected = result.corrected_descriptor();
        assert_eq!(corrected["name"], entry("autofixed", "iudx:Text"));
        assert_eq!(corrected["pm10"], entry("autofixed", "iudx:Number"));
        assert!(result.fields["pm10"].issues[0]
            .message
            .starts_with("invalid descriptor, autofixed to iudx:Number"));
    }

    #[tokio::test]
    async fn test_preserve_descriptions() {
        let config = ReconcilerConfig {
            preserve_descriptions: true,
            ..ReconcilerConfig::default()
        };
        let reconciler = Reconciler::with_config(Arc::new(RuleBasedClassifier::new()), config);
        let descriptor = json!({
            "name": {"type": [], "description": "Name of the temple", "dataSchema": "iudx:Text"},
            "code": {"type": [], "description": "1234", "dataSchema": "iudx:Text"}
        });
        let sample = json!({"name": "Kali Temple", "code": "A1"});
        let corrected = reconciler
            .evaluate(&descriptor, &sample)
            .await
            .unwrap()
            .corrected_descriptor();

        assert_eq!(corrected["name"], entry("Name of the temple", "iudx:Text"));
        assert_eq!(corrected["code"]["description"], "autofixed");
    }

    #[tokio::test]
    async fn test_description_mismatch_is_flagged_not_fixed() {
        let descriptor = json!({"name": entry("Title of the site", "iudx:Text")});
        let result = rules()
            .evaluate(&descriptor, &json!({"name": "Kali Temple"}))
            .await
            .unwrap();

        let verdict = &result.fields["name"];
        assert_eq!(verdict.status, FieldStatus::Rejected);
        assert_eq!(verdict.issues[0].kind, IssueKind::DescriptionMismatch);
        assert!(!verdict.autocorrected);
        assert!(result.is_accepted());
        assert_eq!(result.corrected_descriptor(), descriptor);

        let config = ReconcilerConfig {
            check_descriptions: false,
            ..ReconcilerConfig::default()
        };
        let lenient = Reconciler::with_config(Arc::new(RuleBasedClassifier::new()), config);
        let result = lenient
            .evaluate(&descriptor, &json!({"name": "Kali Temple"}))
            .await
            .unwrap();
        assert_eq!(result.fields["name"].status, FieldStatus::Accepted);
    }

    #[tokio::test]
    async fn test_declared_fields_absent_from_sample_are_untouched() {
        let descriptor = json!({
            "name": entry("name", "iudx:Text"),
            "legacy": {"broken": true}
        });
        let result = rules()
            .evaluate(&descriptor, &json!({"name": "Kali Temple"}))
            .await
            .unwrap();

        assert!(!result.fields.contains_key("legacy"));
        assert_eq!(result.corrected_descriptor()["legacy"], json!({"broken": true}));
    }

    #[tokio::test]
    async fn test_relabel_from_identifier() {
        let descriptor = json!({
            "@context": "https://voc.iudx.org.in/",
            "dataDescriptorLabel": "old",
            "description": "old"
        });
        let result = rules()
            .evaluate(&descriptor, &json!({"filename": "temples.geojson"}))
            .await
            .unwrap();

        let corrected = result.corrected_descriptor();
        assert_eq!(corrected["dataDescriptorLabel"], "Data Descriptor for temples.geojson");
        assert_eq!(
            corrected["description"],
            "Describes the data structure of the temples.geojson dataset."
        );
        assert_eq!(corrected["@context"], "https://voc.iudx.org.in/");
        assert!(result.is_accepted());
        assert_eq!(result.resource_kind, Some(ResourceKind::GeoJson));
    }

    #[tokio::test]
    async fn test_reserved_sample_keys_are_skipped() {
        let descriptor = json!({"description": "Temples of Haryana"});
        let result = rules()
            .evaluate(&descriptor, &json!({"description": "a temple", "type": "x"}))
            .await
            .unwrap();

        assert!(result.fields.is_empty());
        assert_eq!(result.corrected_descriptor(), descriptor);
    }

    #[tokio::test]
    async fn test_custom_policy() {
        let lenient: Arc<dyn SeverityPolicy> = Arc::new(|_: &str| Severity::NonCritical);
        let result = rules()
            .with_policy(lenient)
            .evaluate(&json!({}), &json!({"name": "Kali Temple"}))
            .await
            .unwrap();

        assert!(result.is_accepted());
        assert_eq!(result.fields["name"].status, FieldStatus::Autofixed);
    }

    #[tokio::test]
    async fn test_fallbacks_are_reported_as_warnings() {
        let oracle = TableOracle(HashMap::from([("name", SemanticTypeTag::Text)]));
        let result = Reconciler::new(Arc::new(oracle))
            .evaluate(&json!({}), &json!({"name": "Kali Temple", "pm10": 41.5}))
            .await
            .unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].field, "pm10");
        assert_eq!(result.corrected_descriptor()["pm10"]["dataSchema"], "iudx:Text");
    }

    #[test]
    fn test_reconcile_with_precomputed_inferences() {
        let document = DescriptorDocument::from_value(
            json!({"pm10": entry("pm10 reading", "iudx:Number")}),
            Default::default(),
        )
        .unwrap();
        let sample = Sample::flatten(&json!({"pm10": {"instValue": 70}})).unwrap();
        let inferences =
            HashMap::from([("pm10".to_string(), Inference::confident(SemanticTypeTag::Number))]);

        let result = reconcile(
            document,
            &sample,
            &inferences,
            &ExemptFields::default(),
            &ReconcilerConfig::default(),
        );
        assert!(result.is_accepted());
        assert_eq!(result.fields["pm10"].status, FieldStatus::Accepted);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_nested_layout() {
        let reconciler =
            Reconciler::with_config(Arc::new(RuleBasedClassifier::new()), ReconcilerConfig::nested());
        let metadata = json!({
            "id": "datakaveri.org/temples",
            "dataDescriptor": {"name": entry("name", "iudx:Text")},
            "provider": "iudx"
        });
        let sample = json!({
            "type": "Feature",
            "properties": {"name": "Kali Temple"},
            "geometry": {"type": "Point", "coordinates": [76.4, 29.1]},
            "filename": "temples.geojson"
        });
        let result = reconciler.evaluate(&metadata, &sample).await.unwrap();

        let corrected = result.corrected_descriptor();
        let keys: Vec<&String> = corrected.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "dataDescriptor", "provider"]);
        assert_eq!(corrected["dataDescriptor"]["geometry"]["dataSchema"], "iudx:Point");
        assert_eq!(
            corrected["dataDescriptor"]["dataDescriptorLabel"],
            "Data Descriptor for temples.geojson"
        );
        // geometry is critical, filename is exempt
        assert_eq!(result.status, EvaluationStatus::Rejected);
        assert!(!result.fields["filename"].is_critical());
    }

    #[tokio::test]
    async fn test_structural_errors_abort() {
        let err = rules().evaluate(&json!([]), &json!({})).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Structural(_)));
        let err = rules().evaluate(&json!({}), &json!("x")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Structural(_)));
    }
}
