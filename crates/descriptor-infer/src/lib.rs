//! Semantic type inference for sample values.
//!
//! Every backend answers the same question: given a field name and one sample
//! value, which `iudx:` type tag describes it?
//!
//! ```text
//!                    ┌─────────────────────┐
//!  (field, value) ──►│     TypeOracle      │──► Inference { tag, fallback }
//!                    └──────────┬──────────┘
//!            ┌──────────────────┼───────────────────┐
//!            ▼                  ▼                   ▼
//!   RuleBasedClassifier  TrainedClassifier   OracleClassifier
//!   (deterministic)      (naive Bayes model) (LLM round-trip)
//! ```
//!
//! Backends never fail through this interface. When a backend cannot produce
//! a confident tag it answers `iudx:Text` and says why in
//! [`Inference::fallback`].

pub mod oracle;
pub mod rules;
pub mod trained;

use async_trait::async_trait;
use descriptor_model::SemanticTypeTag;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub use oracle::{CompletionClient, OracleClassifier, OracleError, ScriptedClient};
pub use rules::RuleBasedClassifier;
pub use trained::{
    extract_features, training_examples, ClassifierError, TrainedClassifier, TrainingExample,
    TypeModel,
};

#[cfg(feature = "http")]
pub use oracle::http::{ChatCompletionsClient, OracleConfig};

// ============================================================================
// Classification Contract
// ============================================================================

/// The answer of a classifier for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inference {
    pub tag: SemanticTypeTag,
    /// Set when `tag` is the fallback rather than a confident answer.
    pub fallback: Option<String>,
}

impl Inference {
    pub fn confident(tag: SemanticTypeTag) -> Self {
        Self {
            tag,
            fallback: None,
        }
    }

    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            tag: SemanticTypeTag::FALLBACK,
            fallback: Some(reason.into()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Maps a (field name, sample value) pair to a semantic type tag.
#[async_trait]
pub trait TypeOracle: Send + Sync {
    async fn classify(&self, field: &str, value: &Value) -> Inference;

    /// Short backend name for diagnostics.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: TypeOracle + ?Sized> TypeOracle for Arc<T> {
    async fn classify(&self, field: &str, value: &Value) -> Inference {
        (**self).classify(field, value).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Text form of a sample value as the trained model and the oracle see it.
///
/// Strings are used verbatim, everything else as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Backend Selection
// ============================================================================

/// Build a classifier by backend name.
///
/// - `rules`: `detect_timestamps = "true"` also tags timestamp strings as
///   DateTime
/// - `trained`: requires `model_path`; a missing artifact degrades to Text
/// - `oracle` (feature `http`): optional `api_key`, `model`, `base_url`,
///   `timeout_ms`; falls back to the environment when `api_key` is absent
pub fn create_classifier(
    backend: &str,
    settings: &HashMap<String, String>,
) -> anyhow::Result<Arc<dyn TypeOracle>> {
    match backend {
        "rules" => {
            let classifier = RuleBasedClassifier::new();
            match settings.get("detect_timestamps").map(String::as_str) {
                Some("true") => Ok(Arc::new(classifier.with_timestamps())),
                _ => Ok(Arc::new(classifier)),
            }
        }
        "trained" => {
            let path = settings
                .get("model_path")
                .ok_or_else(|| anyhow::anyhow!("trained classifier requires model_path"))?;
            Ok(Arc::new(TrainedClassifier::open(path)))
        }
        #[cfg(feature = "http")]
        "oracle" => {
            let mut config = match settings.get("api_key") {
                Some(key) => OracleConfig::groq(key, oracle::http::DEFAULT_MODEL),
                None => OracleConfig::from_env()?,
            };
            if let Some(model) = settings.get("model") {
                config.model = model.clone();
            }
            if let Some(base_url) = settings.get("base_url") {
                config.base_url = base_url.clone();
            }
            let client = ChatCompletionsClient::new(config)?;
            let mut classifier = OracleClassifier::new(Arc::new(client));
            if let Some(ms) = settings.get("timeout_ms") {
                let ms: u64 = ms
                    .parse()
                    .map_err(|_| anyhow::anyhow!("timeout_ms must be an integer: {ms}"))?;
                classifier = classifier.with_timeout(std::time::Duration::from_millis(ms));
            }
            Ok(Arc::new(classifier))
        }
        _ => Err(anyhow::anyhow!("Unknown classifier backend: {}", backend)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("Kali Temple")), "Kali Temple");
        assert_eq!(value_text(&json!(70)), "70");
        assert_eq!(value_text(&json!({"instValue": 70})), "{\"instValue\":70}");
    }

    #[test]
    fn test_inference_fallback_is_text() {
        let inference = Inference::fallback("no model");
        assert_eq!(inference.tag, SemanticTypeTag::Text);
        assert!(inference.is_fallback());
        assert!(!Inference::confident(SemanticTypeTag::Point).is_fallback());
    }

    #[tokio::test]
    async fn test_create_rules_backend() {
        let classifier = create_classifier("rules", &HashMap::new()).unwrap();
        assert_eq!(classifier.name(), "rules");
        let inference = classifier.classify("count", &json!(3)).await;
        assert_eq!(inference.tag, SemanticTypeTag::Integer);

        let stamp = json!("2021-07-25T19:46:04+05:30");
        let inference = classifier.classify("observationDateTime", &stamp).await;
        assert_eq!(inference.tag, SemanticTypeTag::Text);

        let settings = HashMap::from([("detect_timestamps".to_string(), "true".to_string())]);
        let classifier = create_classifier("rules", &settings).unwrap();
        let inference = classifier.classify("observationDateTime", &stamp).await;
        assert_eq!(inference.tag, SemanticTypeTag::DateTime);
    }

    #[test]
    fn test_create_unknown_backend() {
        assert!(create_classifier("crystal-ball", &HashMap::new()).is_err());
        assert!(create_classifier("trained", &HashMap::new()).is_err());
    }
}
