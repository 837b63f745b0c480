// Headline selection
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::{decode_json, Decoded, LlmProvider, LlmRequest};
use crate::models::Headline;
use crate::text::truncate_for_log;

/// Number of headlines kept per run.
pub const TOP_N: usize = 5;

const SYSTEM_PROMPT: &str = "You are an assistant that selects the most interesting news headlines.";

#[derive(Debug, Deserialize)]
struct SelectionJson {
    #[serde(default)]
    selected: Vec<Value>,
}

/// Asks the model for the five most interesting headlines.
pub struct Selector {
    provider: Arc<dyn LlmProvider>,
}

impl Selector {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Returns 1-based indices into `headlines`, `min(5, len)` of them, each in range.
    pub async fn select_top(&self, headlines: &[Headline]) -> Vec<usize> {
        if headlines.is_empty() {
            return Vec::new();
        }

        let prompt = build_prompt(headlines);
        let request = LlmRequest::new(SYSTEM_PROMPT, prompt);

        let raw = match self.provider.generate(request).await {
            Ok(response) => {
                info!(model = %response.model, tokens = response.usage.total_tokens, "selection answered");
                response.content
            }
            Err(e) => {
                warn!(error = %e, "selection request failed, keeping leading headlines");
                return leading_indices(headlines.len());
            }
        };

        match decode_json::<SelectionJson>(&raw) {
            Decoded::Parsed(selection) => {
                let indices = normalize_selection(&selection.selected, headlines.len());
                info!(?indices, "model selected headlines");
                indices
            }
            Decoded::Fallback(text) => {
                warn!(answer = %truncate_for_log(&text, 200), "unparsable selection, keeping leading headlines");
                leading_indices(headlines.len())
            }
        }
    }
}

fn build_prompt(headlines: &[Headline]) -> String {
    let mut prompt = format!(
        "Here are {} headlines. Choose {} most interesting to a general reader. \
         Answer ONLY a JSON object like {{\"selected\": [1,2,3,4,5]}} with indices (1-based).\n\n",
        headlines.len(),
        TOP_N
    );
    for (i, h) in headlines.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, h.title));
    }
    prompt
}

/// `1..=min(5, n)`
pub fn leading_indices(n: usize) -> Vec<usize> {
    (1..=n.min(TOP_N)).collect()
}

/// Keep in-range, distinct entries in model order, capped at five, then top up
/// with the lowest unused indices until `min(5, n)` are chosen.
pub fn normalize_selection(raw: &[Value], n: usize) -> Vec<usize> {
    let wanted = n.min(TOP_N);
    let mut chosen: Vec<usize> = Vec::with_capacity(wanted);

    for index in raw.iter().filter_map(as_index) {
        if chosen.len() == wanted {
            break;
        }
        if (1..=n).contains(&index) && !chosen.contains(&index) {
            chosen.push(index);
        }
    }

    for index in 1..=n {
        if chosen.len() == wanted {
            break;
        }
        if !chosen.contains(&index) {
            chosen.push(index);
        }
    }

    chosen
}

fn as_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(num) => {
            if let Some(u) = num.as_u64() {
                usize::try_from(u).ok()
            } else {
                num.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as usize)
            }
        }
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}
