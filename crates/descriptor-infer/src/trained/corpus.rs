//! Training pairs harvested from curated descriptor documents.

use descriptor_model::{FieldDescriptor, Sample, SemanticTypeTag};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SAMPLE_KEY: &str = "dataSample";
pub const DESCRIPTOR_KEY: &str = "dataDescriptor";

/// One labelled (field name, sample value) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub field_name: String,
    pub sample_value: Value,
    pub label: SemanticTypeTag,
}

/// Extract training pairs from a document carrying both a `dataSample` and a
/// `dataDescriptor`.
///
/// Only sample fields whose declared entry validates contribute; entries
/// with a tag outside the vocabulary are skipped. Pairs come out in sample
/// order.
pub fn training_examples(document: &Value) -> Vec<TrainingExample> {
    let Some(descriptor) = document.get(DESCRIPTOR_KEY).and_then(Value::as_object) else {
        return Vec::new();
    };
    let Some(sample) = document
        .get(SAMPLE_KEY)
        .and_then(|raw| Sample::flatten(raw).ok())
    else {
        return Vec::new();
    };

    sample
        .iter()
        .filter_map(|(field, value)| {
            let declared = FieldDescriptor::validate(descriptor.get(field)?).ok()?;
            Some(TrainingExample {
                field_name: field.to_string(),
                sample_value: value.clone(),
                label: declared.data_schema,
            })
        })
        .collect()
}
