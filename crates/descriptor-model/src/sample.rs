//! Sample flattening
//!
//! A sample arrives either as an already-flat record or as a GeoJSON-style
//! feature:
//!
//! ```text
//! { "type": "Feature",                      { "name": "Kali Temple",
//!   "properties": { "name": "Kali Temple" },  "geometry": { "type": "Point", ... },
//!   "geometry": { "type": "Point", ... },  ──►  "filename": "temples.geojson" }
//!   "filename": "temples.geojson" }
//! ```
//!
//! Properties are lifted to the top level, the geometry object is kept
//! verbatim as a single value, and the identifier key passes through.

use crate::error::{json_kind, DocumentKind, StructuralError};
use serde_json::{Map, Value};

/// Default key carrying the dataset identifier.
pub const DEFAULT_IDENTIFIER_KEY: &str = "filename";

pub const PROPERTIES_KEY: &str = "properties";
pub const GEOMETRY_KEY: &str = "geometry";

/// One flat sample record: field name to value, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    fields: Map<String, Value>,
}

impl Sample {
    /// Flatten any accepted sample shape.
    pub fn flatten(value: &Value) -> Result<Self, StructuralError> {
        Self::flatten_with_identifier(value, DEFAULT_IDENTIFIER_KEY)
    }

    /// Flatten, passing `identifier_key` through from a feature wrapper.
    pub fn flatten_with_identifier(
        value: &Value,
        identifier_key: &str,
    ) -> Result<Self, StructuralError> {
        let obj = value.as_object().ok_or(StructuralError::NotAMapping {
            document: DocumentKind::Sample,
            found: json_kind(value),
        })?;

        if is_feature_collection(obj) {
            return flatten_first_feature(obj, identifier_key);
        }

        if is_feature(obj) {
            return flatten_feature(obj, identifier_key);
        }

        Ok(Self {
            fields: obj.clone(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Dataset name carried under `key`, if any.
    ///
    /// Strings are used verbatim; other scalars by their JSON text.
    pub fn identifier(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// A flat record may carry its own `geometry` or a scalar `properties`
/// field; only a declared feature or an object-valued `properties` wraps.
fn is_feature(obj: &Map<String, Value>) -> bool {
    obj.get("type").and_then(Value::as_str) == Some("Feature")
        || obj.get(PROPERTIES_KEY).map_or(false, Value::is_object)
}

fn is_feature_collection(obj: &Map<String, Value>) -> bool {
    obj.get("type").and_then(Value::as_str) == Some("FeatureCollection")
        && obj.get("features").map_or(false, Value::is_array)
}

fn flatten_feature(
    feature: &Map<String, Value>,
    identifier_key: &str,
) -> Result<Sample, StructuralError> {
    let mut fields = Map::new();

    match feature.get(PROPERTIES_KEY) {
        None | Some(Value::Null) => {}
        Some(Value::Object(props)) => {
            fields.extend(props.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Some(other) => {
            return Err(StructuralError::NotAMappingAt {
                document: DocumentKind::Sample,
                key: PROPERTIES_KEY.to_string(),
                found: json_kind(other),
            })
        }
    }

    // Last write wins over a `geometry` property.
    let geometry = feature.get(GEOMETRY_KEY).cloned().unwrap_or(Value::Null);
    fields.insert(GEOMETRY_KEY.to_string(), geometry);

    if let Some(id) = feature.get(identifier_key) {
        fields.insert(identifier_key.to_string(), id.clone());
    }

    Ok(Sample { fields })
}

/// A collection is evaluated through its first feature.
fn flatten_first_feature(
    collection: &Map<String, Value>,
    identifier_key: &str,
) -> Result<Sample, StructuralError> {
    let first = collection
        .get("features")
        .and_then(Value::as_array)
        .and_then(|features| features.first())
        .ok_or(StructuralError::EmptyFeatureCollection {
            document: DocumentKind::Sample,
        })?;

    let feature = first.as_object().ok_or(StructuralError::NotAMappingAt {
        document: DocumentKind::Sample,
        key: "features[0]".to_string(),
        found: json_kind(first),
    })?;

    let mut sample = flatten_feature(feature, identifier_key)?;
    if !sample.contains(identifier_key) {
        if let Some(id) = collection.get(identifier_key) {
            sample.fields.insert(identifier_key.to_string(), id.clone());
        }
    }
    Ok(sample)
}

// ============================================================================
// Resource Kind
// ============================================================================

/// Broad family of dataset a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResourceKind {
    GeoJson,
    EmergencyVehicle,
    EnvAqm,
}

const AQM_KEYS: [&str; 6] = ["airQualityIndex", "pm10", "pm2p5", "co", "no2", "co2"];

impl ResourceKind {
    /// Guess the resource kind from the raw input and an optional file name.
    ///
    /// File-name hints win over key hints; GeoJSON is the fallback.
    pub fn detect(input: &Value, file_name: Option<&str>) -> Self {
        if let Some(name) = file_name {
            let base = name
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(name)
                .to_lowercase();
            if base.contains("geojson") {
                return ResourceKind::GeoJson;
            }
            if base.contains("emergency") || base.contains("ambulance") {
                return ResourceKind::EmergencyVehicle;
            }
            if base.contains("env") || base.contains("aqm") {
                return ResourceKind::EnvAqm;
            }
        }

        let Some(obj) = input.as_object() else {
            return ResourceKind::GeoJson;
        };

        if obj.contains_key(GEOMETRY_KEY)
            || obj.get("type").and_then(Value::as_str) == Some("Feature")
        {
            ResourceKind::GeoJson
        } else if obj.contains_key("emergencyVehicleType") {
            ResourceKind::EmergencyVehicle
        } else if AQM_KEYS.iter().any(|k| obj.contains_key(*k)) {
            ResourceKind::EnvAqm
        } else {
            ResourceKind::GeoJson
        }
    }
}
