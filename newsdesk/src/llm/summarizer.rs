// Summarizer module
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{decode_json, Decoded, LlmProvider, LlmRequest};
use crate::models::Summary;

const SYSTEM_PROMPT: &str =
    "You are an assistant that summarizes news articles into Indonesian and English.";

#[derive(Debug, Deserialize)]
struct SummaryJson {
    #[serde(default)]
    id: String,
    #[serde(default)]
    en: String,
}

/// Produces the Indonesian + English summary of a headline's supporting text.
pub struct Summarizer {
    provider: Arc<dyn LlmProvider>,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Empty input short-circuits to an empty summary without calling the model.
    /// An answer that is not the expected JSON lands verbatim in `id`.
    pub async fn summarize_bilingual(&self, text: &str) -> Summary {
        if text.trim().is_empty() {
            return Summary::empty();
        }

        let request = LlmRequest::new(SYSTEM_PROMPT, build_prompt(text));
        let raw = match self.provider.generate(request).await {
            Ok(response) => {
                info!(model = %response.model, tokens = response.usage.total_tokens, "summary answered");
                response.content
            }
            Err(e) => {
                warn!(error = %e, "summary request failed, storing empty summary");
                return Summary::empty();
            }
        };

        let summary = summary_from_answer(&raw);
        info!(id_chars = summary.id.chars().count(), en_chars = summary.en.chars().count(), "bilingual summary ready");
        summary
    }
}

fn build_prompt(text: &str) -> String {
    format!(
        "Ringkas teks berikut dalam 2 bahasa, Indonesia dan Inggris (komprehensif, jelas, agak panjang).\n\
         Output HARUS berupa JSON valid persis seperti:\n\
         {{ \"id\": \"Ringkasan Bahasa Indonesia\", \"en\": \"English summary\" }}\n\n\
         Teks:\n{}",
        text
    )
}

fn summary_from_answer(raw: &str) -> Summary {
    match decode_json::<SummaryJson>(raw) {
        Decoded::Parsed(parsed) => Summary {
            id: parsed.id.trim().to_string(),
            en: parsed.en.trim().to_string(),
        },
        Decoded::Fallback(text) => {
            warn!("summary answer is not JSON, keeping raw text in `id`");
            Summary { id: text, en: String::new() }
        }
    }
}
