//! Descriptor model: the declared side and the observed side of a dataset.
//!
//! - [`vocab`]: the closed `iudx:` semantic type vocabulary
//! - [`descriptor`]: field descriptors and descriptor documents (top-level or
//!   nested under `dataDescriptor`)
//! - [`sample`]: flattening of feature-shaped samples into one flat record,
//!   plus resource-kind detection

pub mod descriptor;
pub mod error;
pub mod sample;
pub mod vocab;

pub use descriptor::{
    is_reserved_key, DescriptorDocument, DescriptorLayout, DescriptorValidationFailure,
    FieldDescriptor, AUTOFIXED_DESCRIPTION, DEFAULT_NESTED_KEY, VALUE_DESCRIPTOR,
};
pub use error::{json_kind, DocumentKind, StructuralError};
pub use sample::{ResourceKind, Sample, DEFAULT_IDENTIFIER_KEY};
pub use vocab::{SemanticTypeTag, TagParseError, NAMESPACE_PREFIX};
