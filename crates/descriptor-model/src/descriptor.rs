//! Descriptor documents
//!
//! A descriptor document is a JSON object with a few reserved metadata keys
//! (`@context`, `type`, `dataDescriptorLabel`, `description`) and one entry per
//! described field:
//!
//! ```text
//! {
//!   "@context": "https://voc.iudx.org.in/",
//!   "type": ["iudx:DataDescriptor"],
//!   "dataDescriptorLabel": "...",
//!   "description": "...",
//!   "name": {
//!     "type": ["ValueDescriptor"],
//!     "description": "Name of the temple",
//!     "dataSchema": "iudx:Text"
//!   }
//! }
//! ```
//!
//! The field entries either live directly in the document or under a
//! `dataDescriptor` sub-object of a larger metadata document. The layout is
//! chosen by the caller and the document is written back in the same shape.

use crate::error::{json_kind, DocumentKind, StructuralError};
use crate::vocab::{SemanticTypeTag, TagParseError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Category tag every field descriptor must carry.
pub const VALUE_DESCRIPTOR: &str = "ValueDescriptor";

/// Description given to descriptors synthesized by the engine.
pub const AUTOFIXED_DESCRIPTION: &str = "autofixed";

/// Metadata keys that are never field entries.
pub const RESERVED_KEYS: [&str; 4] = ["@context", "type", "dataDescriptorLabel", "description"];

pub const LABEL_KEY: &str = "dataDescriptorLabel";
pub const DESCRIPTION_KEY: &str = "description";

/// Sub-key holding the field entries in the nested layout.
pub const DEFAULT_NESTED_KEY: &str = "dataDescriptor";

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

// ============================================================================
// Field Descriptor
// ============================================================================

/// The declared contract for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub category_tags: Vec<String>,
    pub description: String,
    #[serde(rename = "dataSchema")]
    pub data_schema: SemanticTypeTag,
}

/// Why a declared field entry is not a well-formed [`FieldDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorValidationFailure {
    #[error("field entry must be a JSON object, found {0}")]
    NotAMapping(&'static str),
    #[error("`type` must be a non-empty list of strings")]
    InvalidCategoryTags,
    #[error("`type` must include \"ValueDescriptor\"")]
    MissingValueDescriptorTag,
    #[error("`description` must be a string")]
    InvalidDescription,
    #[error("`dataSchema` must be a string")]
    MissingDataSchema,
    #[error(transparent)]
    InvalidDataSchema(#[from] TagParseError),
}

impl FieldDescriptor {
    /// A descriptor synthesized for a field the engine had to fill in.
    pub fn autofixed(tag: SemanticTypeTag) -> Self {
        Self::with_description(tag, AUTOFIXED_DESCRIPTION)
    }

    pub fn with_description(tag: SemanticTypeTag, description: &str) -> Self {
        Self {
            category_tags: vec![VALUE_DESCRIPTOR.to_string()],
            description: description.to_string(),
            data_schema: tag,
        }
    }

    /// Check a raw field entry against the descriptor contract.
    pub fn validate(entry: &Value) -> Result<Self, DescriptorValidationFailure> {
        let obj = entry
            .as_object()
            .ok_or_else(|| DescriptorValidationFailure::NotAMapping(json_kind(entry)))?;

        let tags = obj
            .get("type")
            .and_then(Value::as_array)
            .filter(|tags| !tags.is_empty())
            .ok_or(DescriptorValidationFailure::InvalidCategoryTags)?;
        let category_tags = tags
            .iter()
            .map(|t| t.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or(DescriptorValidationFailure::InvalidCategoryTags)?;
        if !category_tags.iter().any(|t| t == VALUE_DESCRIPTOR) {
            return Err(DescriptorValidationFailure::MissingValueDescriptorTag);
        }

        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .ok_or(DescriptorValidationFailure::InvalidDescription)?
            .to_string();

        let data_schema = obj
            .get("dataSchema")
            .and_then(Value::as_str)
            .ok_or(DescriptorValidationFailure::MissingDataSchema)?
            .parse::<SemanticTypeTag>()?;

        Ok(Self {
            category_tags,
            description,
            data_schema,
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "type": self.category_tags,
            "description": self.description,
            "dataSchema": self.data_schema.identifier(),
        })
    }
}

// ============================================================================
// Document Layout
// ============================================================================

/// Where the field entries live inside a descriptor document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DescriptorLayout {
    /// Field entries sit next to the metadata keys.
    TopLevel,
    /// Field entries sit under a sub-object of a larger metadata document.
    Nested { key: String },
}

impl DescriptorLayout {
    pub fn nested() -> Self {
        DescriptorLayout::Nested {
            key: DEFAULT_NESTED_KEY.to_string(),
        }
    }
}

impl Default for DescriptorLayout {
    fn default() -> Self {
        DescriptorLayout::TopLevel
    }
}

// ============================================================================
// Descriptor Document
// ============================================================================

/// A descriptor document being read and corrected.
///
/// The field entries are held apart from the rest of the document and put
/// back at their original position on write-back.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorDocument {
    /// Outer metadata document; empty for the top-level layout.
    outer: Map<String, Value>,
    entries: Map<String, Value>,
    layout: DescriptorLayout,
}

impl DescriptorDocument {
    /// Read a document in the given layout.
    ///
    /// In the nested layout a missing sub-object is treated as an empty
    /// descriptor and created on write-back.
    pub fn from_value(value: Value, layout: DescriptorLayout) -> Result<Self, StructuralError> {
        let mut root = match value {
            Value::Object(map) => map,
            other => {
                return Err(StructuralError::NotAMapping {
                    document: DocumentKind::Descriptor,
                    found: json_kind(&other),
                })
            }
        };

        let nested_key = match &layout {
            DescriptorLayout::TopLevel => None,
            DescriptorLayout::Nested { key } => Some(key.clone()),
        };
        let Some(key) = nested_key else {
            return Ok(Self {
                outer: Map::new(),
                entries: root,
                layout,
            });
        };

        // Keep the key in place so write-back preserves document order.
        let entries = match root.insert(key.clone(), Value::Null) {
            None => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(StructuralError::NotAMappingAt {
                    document: DocumentKind::Descriptor,
                    key,
                    found: json_kind(&other),
                })
            }
        };

        Ok(Self {
            outer: root,
            entries,
            layout,
        })
    }

    /// An empty top-level document.
    pub fn empty() -> Self {
        Self {
            outer: Map::new(),
            entries: Map::new(),
            layout: DescriptorLayout::TopLevel,
        }
    }

    /// The object holding the field entries.
    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    /// Names of the declared field entries, in document order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.entries()
            .keys()
            .map(String::as_str)
            .filter(|k| !is_reserved_key(k))
    }

    /// The raw entry declared for a field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.entries().get(name)
    }

    /// Insert or replace a field entry wholesale.
    pub fn set_field(&mut self, name: &str, descriptor: &FieldDescriptor) {
        self.entries.insert(name.to_string(), descriptor.to_value());
    }

    /// Overwrite only the `dataSchema` of an existing object entry.
    ///
    /// Returns false if the entry is missing or not an object.
    pub fn set_data_schema(&mut self, name: &str, tag: SemanticTypeTag) -> bool {
        match self.entries.get_mut(name) {
            Some(Value::Object(entry)) => {
                entry.insert("dataSchema".to_string(), Value::String(tag.identifier()));
                true
            }
            _ => false,
        }
    }

    /// Regenerate the descriptor's label and description from a dataset name.
    pub fn relabel_for(&mut self, dataset: &str) {
        self.entries.insert(
            LABEL_KEY.to_string(),
            Value::String(format!("Data Descriptor for {dataset}")),
        );
        self.entries.insert(
            DESCRIPTION_KEY.to_string(),
            Value::String(format!(
                "Describes the data structure of the {dataset} dataset."
            )),
        );
    }

    pub fn to_value(&self) -> Value {
        self.clone().into_value()
    }

    /// The corrected document, in the layout it was read.
    pub fn into_value(self) -> Value {
        match self.layout {
            DescriptorLayout::TopLevel => Value::Object(self.entries),
            DescriptorLayout::Nested { key } => {
                let mut outer = self.outer;
                outer.insert(key, Value::Object(self.entries));
                Value::Object(outer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_well_formed_entry() {
        let entry = json!({
            "type": ["ValueDescriptor"],
            "description": "Name of the temple",
            "dataSchema": "iudx:Text"
        });
        let fd = FieldDescriptor::validate(&entry).unwrap();
        assert_eq!(fd.data_schema, SemanticTypeTag::Text);
        assert_eq!(fd.description, "Name of the temple");
    }

    #[test]
    fn test_validate_rejects_malformed_entries() {
        let cases = [
            (json!("iudx:Text"), "string entry"),
            (
                json!({"type": [], "description": "x", "dataSchema": "iudx:Text"}),
                "empty tags",
            ),
            (
                json!({"type": ["Other"], "description": "x", "dataSchema": "iudx:Text"}),
                "no ValueDescriptor tag",
            ),
            (
                json!({"type": ["ValueDescriptor"], "dataSchema": "iudx:Text"}),
                "no description",
            ),
            (
                json!({"type": ["ValueDescriptor"], "description": "x", "dataSchema": "Text"}),
                "no namespace",
            ),
            (
                json!({"type": ["ValueDescriptor"], "description": "x", "dataSchema": "iudx:Polygon"}),
                "unknown tag",
            ),
        ];

        for (entry, label) in cases {
            assert!(FieldDescriptor::validate(&entry).is_err(), "{label}");
        }
    }

    #[test]
    fn test_autofixed_shape() {
        let value = FieldDescriptor::autofixed(SemanticTypeTag::Point).to_value();
        assert_eq!(
            value,
            json!({
                "type": ["ValueDescriptor"],
                "description": "autofixed",
                "dataSchema": "iudx:Point"
            })
        );
    }

    #[test]
    fn test_top_level_document() {
        let mut doc = DescriptorDocument::from_value(
            json!({
                "@context": "https://voc.iudx.org.in/",
                "description": "old",
                "name": {"type": ["ValueDescriptor"], "description": "Name", "dataSchema": "iudx:Number"}
            }),
            DescriptorLayout::TopLevel,
        )
        .unwrap();

        assert_eq!(doc.field_names().collect::<Vec<_>>(), vec!["name"]);
        assert!(doc.set_data_schema("name", SemanticTypeTag::Text));
        assert!(!doc.set_data_schema("absent", SemanticTypeTag::Text));
        assert_eq!(doc.field("name").unwrap()["dataSchema"], "iudx:Text");
        assert_eq!(doc.field("name").unwrap()["description"], "Name");
    }

    #[test]
    fn test_nested_document_roundtrip_preserves_outer_keys() {
        let mut doc = DescriptorDocument::from_value(
            json!({"id": "abc", "provider": ""}),
            DescriptorLayout::nested(),
        )
        .unwrap();

        doc.set_field("pm10", &FieldDescriptor::autofixed(SemanticTypeTag::Number));
        doc.relabel_for("aqm.json");

        let out = doc.into_value();
        assert_eq!(out["id"], "abc");
        assert_eq!(out["dataDescriptor"]["pm10"]["dataSchema"], "iudx:Number");
        assert_eq!(
            out["dataDescriptor"]["dataDescriptorLabel"],
            "Data Descriptor for aqm.json"
        );
        assert!(out.get("dataDescriptorLabel").is_none());
    }

    #[test]
    fn test_structural_errors() {
        let err = DescriptorDocument::from_value(json!([1, 2]), DescriptorLayout::TopLevel)
            .unwrap_err();
        assert_eq!(err.document(), DocumentKind::Descriptor);

        let err = DescriptorDocument::from_value(
            json!({"dataDescriptor": "nope"}),
            DescriptorLayout::nested(),
        )
        .unwrap_err();
        assert!(matches!(err, StructuralError::NotAMappingAt { .. }));
    }
}
