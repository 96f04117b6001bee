//! Description-match heuristic.
//!
//! A description is apt when it mentions the field key. The key is tried
//! case-folded as written, with separator punctuation removed, and split
//! into words (`airQualityIndex` → `air quality index`). This is keyword
//! containment only and says nothing about whether the prose is correct.

use descriptor_infer::trained::split_words;

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '_' | '-' | ' ' | ':' | '/')
}

pub fn is_description_apt(key: &str, description: &str) -> bool {
    let haystack = description.to_lowercase();
    let folded = key.to_lowercase();
    let stripped: String = folded.chars().filter(|c| !is_separator(*c)).collect();
    let spaced = split_words(key).join(" ");

    if stripped.is_empty() {
        return true;
    }

    [folded, stripped, spaced]
        .iter()
        .any(|candidate| !candidate.is_empty() && haystack.contains(candidate.as_str()))
}
