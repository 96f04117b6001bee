//! Rule-based classification
//!
//! Checks are applied in a fixed order and the first match wins:
//!
//! 1. digit-only string → Integer
//! 2. JSON number → Integer (integral) or Number (float)
//! 3. JSON boolean → Boolean
//! 4. pair of floats → Point
//! 5. object with `"type": "Point"` → Point
//! 6. other strings: integer parse → Integer, decimal parse → Number,
//!    any letter → Text
//! 7. nothing matched → no confident tag
//!
//! With [`RuleBasedClassifier::with_timestamps`], a residual string that
//! parses as a timestamp or calendar date is tagged DateTime before the
//! Text check.

use crate::{Inference, TypeOracle};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use descriptor_model::{json_kind, SemanticTypeTag};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedClassifier {
    detect_timestamps: bool,
}

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also tag timestamp and date strings as DateTime.
    pub fn with_timestamps(mut self) -> Self {
        self.detect_timestamps = true;
        self
    }

    /// The tag the rules assign to `value`, if any rule matches.
    pub fn classify_value(&self, value: &Value) -> Option<SemanticTypeTag> {
        match value {
            Value::String(s) if is_digits(s) => Some(SemanticTypeTag::Integer),
            Value::Number(n) if n.is_f64() => Some(SemanticTypeTag::Number),
            Value::Number(_) => Some(SemanticTypeTag::Integer),
            Value::Bool(_) => Some(SemanticTypeTag::Boolean),
            Value::Array(items) if is_coordinate_pair(items) => Some(SemanticTypeTag::Point),
            Value::Object(obj) if obj.get("type").and_then(Value::as_str) == Some("Point") => {
                Some(SemanticTypeTag::Point)
            }
            Value::String(s) => classify_text(s, self.detect_timestamps),
            _ => None,
        }
    }
}

#[async_trait]
impl TypeOracle for RuleBasedClassifier {
    async fn classify(&self, _field: &str, value: &Value) -> Inference {
        match self.classify_value(value) {
            Some(tag) => Inference::confident(tag),
            None => Inference::fallback(format!("no rule matched {} value", json_kind(value))),
        }
    }

    fn name(&self) -> &str {
        "rules"
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn is_coordinate_pair(items: &[Value]) -> bool {
    items.len() == 2
        && items
            .iter()
            .all(|v| matches!(v, Value::Number(n) if n.is_f64()))
}

fn is_integral(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    is_digits(digits)
}

fn classify_text(s: &str, detect_timestamps: bool) -> Option<SemanticTypeTag> {
    let trimmed = s.trim();
    if is_integral(trimmed) {
        return Some(SemanticTypeTag::Integer);
    }
    if trimmed.parse::<f64>().is_ok() {
        return Some(SemanticTypeTag::Number);
    }
    if detect_timestamps && is_timestamp(trimmed) {
        return Some(SemanticTypeTag::DateTime);
    }
    if s.chars().any(char::is_alphabetic) {
        return Some(SemanticTypeTag::Text);
    }
    None
}

const NAIVE_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// ISO-8601 style timestamps and plain calendar dates.
fn is_timestamp(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || OFFSET_DATETIME_FORMATS
            .iter()
            .any(|fmt| DateTime::parse_from_str(s, fmt).is_ok())
        || NAIVE_DATETIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(s, fmt).is_ok())
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}
