use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Core trait for LLM providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Request structure for LLM generation
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    /// Optional system message sent before the prompt
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

impl LlmRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

pub mod copywriter;
pub mod remote;
pub mod selector;
pub mod summarizer;

/// Outcome of decoding a model answer that should be a single JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Parsed(T),
    /// The answer did not decode; carries the fence-stripped text.
    Fallback(String),
}

impl<T> Decoded<T> {
    pub fn parsed(self) -> Option<T> {
        match self {
            Decoded::Parsed(value) => Some(value),
            Decoded::Fallback(_) => None,
        }
    }
}

/// Strip a surrounding markdown code fence and an optional leading `json` tag.
pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    if !text.starts_with("```") {
        return text;
    }
    let inner = text.trim_matches('`');
    let inner = match inner.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &inner[4..],
        _ => inner,
    };
    inner.trim()
}

/// Decode a model answer as a single JSON object of type `T`, tolerating
/// code-fence wrapping. Anything else is a fallback; no attempt is made to dig
/// JSON out of prose.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Decoded<T> {
    let cleaned = strip_code_fence(raw);
    let value = match serde_json::from_str::<Value>(cleaned) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => {
            debug!("model answer is JSON but not an object");
            return Decoded::Fallback(cleaned.to_string());
        }
        Err(e) => {
            debug!(error = %e, "model answer is not JSON");
            return Decoded::Fallback(cleaned.to_string());
        }
    };
    match serde_json::from_value::<T>(value) {
        Ok(parsed) => Decoded::Parsed(parsed),
        Err(e) => {
            debug!(error = %e, "model answer has the wrong shape");
            Decoded::Fallback(cleaned.to_string())
        }
    }
}
