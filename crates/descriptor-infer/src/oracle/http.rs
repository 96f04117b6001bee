//! OpenAI-compatible chat completions client.

use super::{CompletionClient, OracleError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "llama3-70b-8192";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_tokens: Option<u32>,
}

impl OracleConfig {
    /// Load from environment variables, Groq first, then OpenAI.
    pub fn from_env() -> Result<Self, OracleError> {
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            let mut config = Self::groq(
                &key,
                &std::env::var("GROQ_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            );
            if let Ok(url) = std::env::var("GROQ_BASE_URL") {
                config.base_url = url;
            }
            return Ok(config);
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            let mut config = Self::openai(
                &key,
                &std::env::var("OPENAI_MODEL").unwrap_or_else(|_| OPENAI_DEFAULT_MODEL.to_string()),
            );
            if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
                config.base_url = url;
            }
            return Ok(config);
        }

        Err(OracleError::Config(
            "no oracle provider configured. Set GROQ_API_KEY or OPENAI_API_KEY".to_string(),
        ))
    }

    pub fn groq(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: GROQ_BASE_URL.to_string(),
            temperature: 0.0,
            timeout_secs: 60,
            max_tokens: Some(16),
        }
    }

    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            ..Self::groq(api_key, model)
        }
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct ChatCompletionsClient {
    client: Client,
    config: OracleConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        if config.api_key.is_empty() {
            return Err(OracleError::Config("api key is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionsClient {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.config.temperature,
        });
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(OracleError::RateLimited {
                retry_after_ms: retry_after * 1000,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OracleError::Api(format!("{status}: {error_text}")));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                OracleError::InvalidResponse("missing choices[0].message.content".to_string())
            })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
