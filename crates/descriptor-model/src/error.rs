use serde_json::Value;
use std::fmt;

/// Which input document a structural failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Descriptor,
    Sample,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Descriptor => write!(f, "descriptor"),
            DocumentKind::Sample => write!(f, "sample"),
        }
    }
}

/// A document could not be read into the shape the engine expects.
///
/// Fatal for an evaluation call: no report is produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructuralError {
    #[error("{document} document must be a JSON object, found {found}")]
    NotAMapping {
        document: DocumentKind,
        found: &'static str,
    },
    #[error("{document} document: `{key}` must be a JSON object, found {found}")]
    NotAMappingAt {
        document: DocumentKind,
        key: String,
        found: &'static str,
    },
    #[error("{document} document: feature collection has no features")]
    EmptyFeatureCollection { document: DocumentKind },
}

impl StructuralError {
    pub fn document(&self) -> DocumentKind {
        match self {
            StructuralError::NotAMapping { document, .. }
            | StructuralError::NotAMappingAt { document, .. }
            | StructuralError::EmptyFeatureCollection { document } => *document,
        }
    }
}

/// Short JSON kind name used in diagnostics.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
