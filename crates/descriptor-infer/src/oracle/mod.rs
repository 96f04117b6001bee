//! Oracle classification
//!
//! Asks a generative text service for the tag of one field. The service is
//! reached through the [`CompletionClient`] seam so the prompt, the response
//! protocol and the fallback rules can be exercised without a network.
//!
//! The answer is trusted only when it names one of the five tags the prompt
//! offers. Anything else (errors, timeouts, chatter) degrades to `iudx:Text`.

#[cfg(feature = "http")]
pub mod http;

use crate::{value_text, Inference, TypeOracle};
use async_trait::async_trait;
use descriptor_model::{SemanticTypeTag, NAMESPACE_PREFIX};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("answer is not a permitted tag: {0:?}")]
    ProtocolViolation(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A text completion endpoint.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;

    fn model(&self) -> &str;
}

// ============================================================================
// Prompt Protocol
// ============================================================================

/// The classification prompt for one field.
pub fn build_prompt(field: &str, value: &Value) -> String {
    let choices: String = SemanticTypeTag::ORACLE_CHOICES
        .iter()
        .map(|tag| format!("- {tag}\n"))
        .collect();

    format!(
        r#"You are an expert in semantic data modeling for everything.

Given a field name and a sample value, predict the most suitable IUDX dataSchema type.

Use only the following types:
{choices}
Respond with **only** the type like this: `iudx:Text` (no explanations).

Example 1:
Field: "Name", Value: "Temple of Kali"
Answer: iudx:Text

Example 2:
Field: "Latitude", Value: 28.6139
Answer: iudx:Number

Example 3:
Field: "geometry", Value: {{ "type": "Point", "coordinates": [76.4, 29.1] }}
Answer: iudx:Point

Respond ONLY with the type, like this: iudx:Text (no 'Answer:' or quotes).
Field: "{field}"
Value: {value}"#,
        value = value_text_for_prompt(value),
    )
}

fn value_text_for_prompt(value: &Value) -> String {
    // Strings are quoted in the prompt, unlike in the feature encoder.
    match value {
        Value::String(_) => value.to_string(),
        other => value_text(other),
    }
}

/// Extract the tag from a raw completion.
///
/// The first whitespace-separated token starting with `iudx:` (after
/// stripping quotes, backticks and trailing periods) must be one of the
/// permitted tags.
pub fn parse_response(raw: &str) -> Result<SemanticTypeTag, OracleError> {
    let token = raw
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.' | ',')))
        .find(|t| t.starts_with(NAMESPACE_PREFIX))
        .ok_or_else(|| OracleError::ProtocolViolation(raw.trim().to_string()))?;

    token
        .parse::<SemanticTypeTag>()
        .ok()
        .filter(|tag| SemanticTypeTag::ORACLE_CHOICES.contains(tag))
        .ok_or_else(|| OracleError::ProtocolViolation(token.to_string()))
}

/// Refine a numeric answer against the JSON value it was given.
fn refine_numeric(tag: SemanticTypeTag, value: &Value) -> SemanticTypeTag {
    match value {
        Value::Number(n) if tag.is_numeric() => {
            if n.is_f64() {
                SemanticTypeTag::Number
            } else {
                SemanticTypeTag::Integer
            }
        }
        _ => tag,
    }
}

// ============================================================================
// Classifier
// ============================================================================

pub struct OracleClassifier {
    client: Arc<dyn CompletionClient>,
    timeout: Option<Duration>,
}

impl OracleClassifier {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Bound every completion call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn ask(&self, prompt: &str) -> Result<String, OracleError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.client.complete(prompt))
                .await
                .map_err(|_| OracleError::Timeout(limit))?,
            None => self.client.complete(prompt).await,
        }
    }
}

#[async_trait]
impl TypeOracle for OracleClassifier {
    async fn classify(&self, field: &str, value: &Value) -> Inference {
        let prompt = build_prompt(field, value);
        let answer = self.ask(&prompt).await.and_then(|raw| parse_response(&raw));

        match answer {
            Ok(tag) => Inference::confident(refine_numeric(tag, value)),
            Err(err) => {
                tracing::warn!(
                    field = %field,
                    model = %self.client.model(),
                    error = %err,
                    "oracle classification failed; using iudx:Text"
                );
                Inference::fallback(format!("oracle: {err}"))
            }
        }
    }

    fn name(&self) -> &str {
        "oracle"
    }
}

// ============================================================================
// Scripted Client
// ============================================================================

/// Deterministic [`CompletionClient`] that replays canned answers in order.
pub struct ScriptedClient {
    responses: Vec<String>,
    failure: Option<OracleError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// A client whose every call fails with `error`.
    pub fn failing(error: OracleError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(Vec::new())
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if self.responses.is_empty() {
            return Err(OracleError::InvalidResponse("no scripted response".to_string()));
        }
        Ok(self.responses[idx % self.responses.len()].clone())
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
