use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{decode_json, LlmProvider, LlmRequest};
use crate::models::SocialPost;

const SYSTEM_PROMPT: &str = "You are a social media copywriter.";

#[derive(Debug, Deserialize)]
struct SocialPostJson {
    #[serde(default)]
    title: String,
    #[serde(default)]
    ig_post: String,
}

/// Turns an English summary into a short title and one social-post slide.
pub struct SocialCopyGenerator {
    provider: Arc<dyn LlmProvider>,
}

impl SocialCopyGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// `None` when there is no summary to work from or the answer does not decode.
    pub async fn derive_social_post(&self, english_summary: &str) -> Option<SocialPost> {
        if english_summary.trim().is_empty() {
            return None;
        }

        let request = LlmRequest::new(SYSTEM_PROMPT, build_prompt(english_summary));
        let raw = match self.provider.generate(request).await {
            Ok(response) => {
                info!(model = %response.model, tokens = response.usage.total_tokens, "social copy answered");
                response.content
            }
            Err(e) => {
                warn!(error = %e, "social copy request failed");
                return None;
            }
        };

        let post = post_from_answer(&raw);
        match &post {
            Some(p) => info!(title = %p.title, "social copy ready"),
            None => warn!("social copy answer is not JSON, dropping it"),
        }
        post
    }
}

fn build_prompt(english_summary: &str) -> String {
    format!(
        "Given the following English summary, produce JSON: \
         {{\"title\": \"short title (<=10 words)\", \"ig_post\": \"IG post text (one slide)\"}}\n\n\
         Summary:\n{}",
        english_summary
    )
}

fn post_from_answer(raw: &str) -> Option<SocialPost> {
    decode_json::<SocialPostJson>(raw).parsed().map(|p| SocialPost {
        title: p.title.trim().to_string(),
        ig_post: p.ig_post.trim().to_string(),
    })
}
