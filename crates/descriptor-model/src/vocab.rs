//! Semantic type vocabulary
//!
//! Every `dataSchema` value in a descriptor is drawn from a closed, namespaced
//! vocabulary. Parsing is exact: the namespace prefix is mandatory and unknown
//! local names are rejected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Reserved namespace prefix carried by every `dataSchema` identifier.
pub const NAMESPACE_PREFIX: &str = "iudx:";

/// A canonical semantic type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SemanticTypeTag {
    Text,
    Number,
    Integer,
    Boolean,
    Point,
    DateTime,
}

impl SemanticTypeTag {
    /// The full closed vocabulary.
    pub const ALL: [SemanticTypeTag; 6] = [
        SemanticTypeTag::Text,
        SemanticTypeTag::Number,
        SemanticTypeTag::Integer,
        SemanticTypeTag::Boolean,
        SemanticTypeTag::Point,
        SemanticTypeTag::DateTime,
    ];

    /// The tags a semantic oracle is allowed to answer with.
    pub const ORACLE_CHOICES: [SemanticTypeTag; 5] = [
        SemanticTypeTag::Text,
        SemanticTypeTag::Number,
        SemanticTypeTag::Integer,
        SemanticTypeTag::Boolean,
        SemanticTypeTag::Point,
    ];

    /// Tag used whenever a classifier cannot produce a confident answer.
    pub const FALLBACK: SemanticTypeTag = SemanticTypeTag::Text;

    pub fn local_name(&self) -> &'static str {
        match self {
            SemanticTypeTag::Text => "Text",
            SemanticTypeTag::Number => "Number",
            SemanticTypeTag::Integer => "Integer",
            SemanticTypeTag::Boolean => "Boolean",
            SemanticTypeTag::Point => "Point",
            SemanticTypeTag::DateTime => "DateTime",
        }
    }

    /// Namespaced identifier, e.g. `iudx:Number`.
    pub fn identifier(&self) -> String {
        format!("{}{}", NAMESPACE_PREFIX, self.local_name())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SemanticTypeTag::Number | SemanticTypeTag::Integer)
    }

    /// Whether a declared tag is satisfied by an inferred one.
    ///
    /// Equal tags always satisfy each other; Number and Integer satisfy each
    /// other in both directions.
    pub fn satisfies(declared: SemanticTypeTag, inferred: SemanticTypeTag) -> bool {
        declared == inferred || (declared.is_numeric() && inferred.is_numeric())
    }
}

impl fmt::Display for SemanticTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NAMESPACE_PREFIX, self.local_name())
    }
}

/// Why a `dataSchema` identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagParseError {
    #[error("dataSchema must start with 'iudx:': {0}")]
    MissingNamespace(String),
    #[error("unknown dataSchema: {0}")]
    Unknown(String),
}

impl FromStr for SemanticTypeTag {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let local = s
            .strip_prefix(NAMESPACE_PREFIX)
            .ok_or_else(|| TagParseError::MissingNamespace(s.to_string()))?;

        SemanticTypeTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.local_name() == local)
            .ok_or_else(|| TagParseError::Unknown(s.to_string()))
    }
}

impl Serialize for SemanticTypeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.identifier())
    }
}

impl<'de> Deserialize<'de> for SemanticTypeTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
