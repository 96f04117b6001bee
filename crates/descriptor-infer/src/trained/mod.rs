//! Trained classification
//!
//! A multinomial naive Bayes model fit on labelled (field name, sample value)
//! pairs. The model is persisted as JSON next to the data it was trained on
//! and loaded at construction time.
//!
//! ```text
//! P(tag | features) ∝ P(tag) · Π P(feature | tag)
//! P(feature | tag)  = (count(feature, tag) + 1) / (total(tag) + |V|)
//! ```
//!
//! [`TrainedClassifier::open`] never fails: a missing or unreadable artifact
//! leaves the classifier answering `iudx:Text` with a warning.

mod corpus;
mod features;

pub use corpus::{training_examples, TrainingExample};
pub use features::{extract_features, split_words};

use crate::{Inference, TypeOracle};
use async_trait::async_trait;
use descriptor_model::SemanticTypeTag;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Current model file format version
pub const MODEL_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("cannot access model artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed model artifact: {0}")]
    Format(#[from] serde_json::Error),
    #[error("unsupported model version {found} (expected at most {MODEL_VERSION})")]
    Version { found: u32 },
    #[error("cannot fit a model without training examples")]
    EmptyTrainingSet,
}

// ============================================================================
// Model
// ============================================================================

/// Per-tag counts learned from the training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub tag: SemanticTypeTag,
    pub examples: u64,
    pub total_features: u64,
    pub feature_counts: HashMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeModel {
    pub version: u32,
    pub classes: Vec<ClassStats>,
    pub vocabulary_size: usize,
}

impl TypeModel {
    pub fn fit(examples: &[TrainingExample]) -> Result<Self, ClassifierError> {
        if examples.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet);
        }

        let mut classes: HashMap<SemanticTypeTag, ClassStats> = HashMap::new();
        let mut vocabulary = BTreeSet::new();

        for example in examples {
            let stats = classes.entry(example.label).or_insert_with(|| ClassStats {
                tag: example.label,
                examples: 0,
                total_features: 0,
                feature_counts: HashMap::new(),
            });
            stats.examples += 1;

            for feature in extract_features(&example.field_name, &example.sample_value) {
                stats.total_features += 1;
                *stats.feature_counts.entry(feature.clone()).or_insert(0) += 1;
                vocabulary.insert(feature);
            }
        }

        let mut classes: Vec<ClassStats> = classes.into_values().collect();
        classes.sort_by_key(|c| c.tag);

        Ok(Self {
            version: MODEL_VERSION,
            classes,
            vocabulary_size: vocabulary.len(),
        })
    }

    /// Most probable tag and its posterior probability.
    pub fn predict(&self, field: &str, value: &Value) -> Option<(SemanticTypeTag, f64)> {
        let total_examples: u64 = self.classes.iter().map(|c| c.examples).sum();
        if total_examples == 0 {
            return None;
        }

        let features = extract_features(field, value);
        let vocab = self.vocabulary_size.max(1) as f64;

        let scores: Vec<(SemanticTypeTag, f64)> = self
            .classes
            .iter()
            .filter(|c| c.examples > 0)
            .map(|class| {
                let prior = (class.examples as f64 / total_examples as f64).ln();
                let denom = class.total_features as f64 + vocab;
                let likelihood: f64 = features
                    .iter()
                    .map(|f| {
                        let count = class.feature_counts.get(f).copied().unwrap_or(0) as f64;
                        ((count + 1.0) / denom).ln()
                    })
                    .sum();
                (class.tag, prior + likelihood)
            })
            .collect();

        let (best_tag, best_score) = scores
            .iter()
            .copied()
            .max_by(|a, b| a.1.total_cmp(&b.1))?;

        // Normalize in log space.
        let norm: f64 = scores.iter().map(|(_, s)| (s - best_score).exp()).sum();
        Some((best_tag, 1.0 / norm))
    }

    pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        let file = File::create(path).map_err(|source| ClassifierError::Artifact {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let file = File::open(path).map_err(|source| ClassifierError::Artifact {
            path: path.to_path_buf(),
            source,
        })?;
        let model: TypeModel = serde_json::from_reader(BufReader::new(file))?;
        if model.version > MODEL_VERSION {
            return Err(ClassifierError::Version {
                found: model.version,
            });
        }
        Ok(model)
    }
}

// ============================================================================
// Classifier
// ============================================================================

#[derive(Debug, Clone)]
enum ModelState {
    Ready(TypeModel),
    Unavailable(String),
}

/// [`TypeOracle`] backed by a fitted [`TypeModel`].
#[derive(Debug, Clone)]
pub struct TrainedClassifier {
    state: ModelState,
}

impl TrainedClassifier {
    pub fn from_model(model: TypeModel) -> Self {
        Self {
            state: ModelState::Ready(model),
        }
    }

    /// Load the model at `path`, failing on a missing or malformed artifact.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        TypeModel::load(path.as_ref()).map(Self::from_model)
    }

    /// Load the model at `path`, degrading to the Text fallback on failure.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match TypeModel::load(path) {
            Ok(model) => Self::from_model(model),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "type model unavailable; trained classifier will answer iudx:Text"
                );
                Self {
                    state: ModelState::Unavailable(err.to_string()),
                }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    pub fn model(&self) -> Option<&TypeModel> {
        match &self.state {
            ModelState::Ready(model) => Some(model),
            ModelState::Unavailable(_) => None,
        }
    }
}

#[async_trait]
impl TypeOracle for TrainedClassifier {
    async fn classify(&self, field: &str, value: &Value) -> Inference {
        match &self.state {
            ModelState::Unavailable(reason) => {
                Inference::fallback(format!("type model unavailable: {reason}"))
            }
            ModelState::Ready(model) => match model.predict(field, value) {
                Some((tag, _)) => Inference::confident(tag),
                None => Inference::fallback("type model has no trained classes"),
            },
        }
    }

    fn name(&self) -> &str {
        "trained"
    }
}
