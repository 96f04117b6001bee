//! Feature encoding for (field name, sample value) pairs.

use crate::value_text;
use descriptor_model::json_kind;
use serde_json::Value;

const MAX_TRIGRAM_CHARS: usize = 64;
const MAX_SHAPE_LEN: usize = 24;

/// Encode one pair as a bag of string features.
///
/// Field-name features are word pieces of the name; value features describe
/// the JSON kind, the character shape, the length and character trigrams of
/// the value's text form.
pub fn extract_features(field: &str, value: &Value) -> Vec<String> {
    let mut features = Vec::new();

    for word in split_words(field) {
        features.push(format!("f:{word}"));
    }
    features.push(format!("k:{}", json_kind(value)));

    let text = value_text(value);
    features.push(format!("s:{}", shape(&text)));
    features.push(format!("l:{}", length_bucket(text.chars().count())));

    let lowered: Vec<char> = text.to_lowercase().chars().take(MAX_TRIGRAM_CHARS).collect();
    for window in lowered.windows(3) {
        features.push(format!("c:{}", window.iter().collect::<String>()));
    }

    features
}

/// Lower-cased word pieces of an identifier (`airQualityIndex`,
/// `pm2p5`, `observation_date_time`).
pub fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Character-class shape with runs collapsed: `"28.61"` → `"9.9"`,
/// `"Kali Temple"` → `"a a"`.
fn shape(text: &str) -> String {
    let mut out = String::new();
    let mut last = None;
    for c in text.chars() {
        let class = if c.is_ascii_digit() {
            '9'
        } else if c.is_alphabetic() {
            'a'
        } else {
            c
        };
        if last != Some(class) {
            out.push(class);
            last = Some(class);
        }
        if out.len() >= MAX_SHAPE_LEN {
            break;
        }
    }
    out
}

fn length_bucket(len: usize) -> &'static str {
    match len {
        0 => "0",
        1..=3 => "1-3",
        4..=8 => "4-8",
        9..=16 => "9-16",
        _ => "17+",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("airQualityIndex"), vec!["air", "quality", "index"]);
        assert_eq!(split_words("observation_date-time"), vec!["observation", "date", "time"]);
        assert_eq!(split_words("pm2p5"), vec!["pm2p5"]);
        assert_eq!(split_words("NAME"), vec!["name"]);
    }

    #[test]
    fn test_shape() {
        assert_eq!(shape("28.6139"), "9.9");
        assert_eq!(shape("Kali Temple"), "a a");
        assert_eq!(shape(""), "");
    }

    #[test]
    fn test_extract_features() {
        let features = extract_features("Latitude", &json!(28.6139));
        assert!(features.contains(&"f:latitude".to_string()));
        assert!(features.contains(&"k:number".to_string()));
        assert!(features.contains(&"s:9.9".to_string()));
        assert!(features.contains(&"l:4-8".to_string()));
        assert!(features.contains(&"c:28.".to_string()));
        assert!(features.contains(&"c:8.6".to_string()));
    }
}
