use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use super::{NewsQuery, SearchProvider, SearchResponse};

/// Ceiling for the pause between attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Pause before `attempt` (1-based): nothing for the first, then 1s, 2s, 4s... up to `MAX_BACKOFF`.
fn backoff_before(attempt: u32) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    Duration::from_secs(2u64.saturating_pow(attempt - 2)).min(MAX_BACKOFF)
}

/// SerpApi `google_news` engine client.
pub struct SerpApiClient {
    client: Client,
    api_url: String,
    api_key: String,
    language: String,
    region: String,
    max_retries: u32,
}

impl SerpApiClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Newsdesk/0.1.0")
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            language: "en".to_string(),
            region: "US".to_string(),
            max_retries: 3,
        })
    }

    /// `hl` and `gl` request parameters.
    pub fn with_locale(mut self, language: impl Into<String>, region: impl Into<String>) -> Self {
        self.language = language.into();
        self.region = region.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    fn params<'a>(&'a self, query: &'a NewsQuery) -> [(&'static str, &'a str); 5] {
        let token = match query {
            NewsQuery::Topic(token) => ("topic_token", token.as_str()),
            NewsQuery::Story(token) => ("story_token", token.as_str()),
        };
        [
            ("engine", "google_news"),
            token,
            ("hl", self.language.as_str()),
            ("gl", self.region.as_str()),
            ("api_key", self.api_key.as_str()),
        ]
    }
}

#[async_trait::async_trait]
impl SearchProvider for SerpApiClient {
    /// Retries network errors, 5xx and 429 with exponential backoff (1s, 2s, 4s... capped at 30s).
    /// Other client errors fail immediately.
    async fn search(&self, query: NewsQuery) -> Result<SearchResponse> {
        let params = self.params(&query);
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                let backoff = backoff_before(attempt);
                info!(?query, attempt, max = self.max_retries, ?backoff, "retrying news search");
                tokio::time::sleep(backoff).await;
            }

            match self.client.get(&self.api_url).query(&params).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body: SearchResponse = response
                            .json()
                            .await
                            .map_err(|e| e.without_url())
                            .context("failed to parse news search response")?;
                        if let Some(error) = body.error {
                            anyhow::bail!("news search provider error: {}", error);
                        }
                        return Ok(body);
                    } else if status.is_server_error() {
                        last_error = Some(anyhow::anyhow!("server error: {}", status));
                        continue;
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(anyhow::anyhow!("rate limited: {}", status));
                        continue;
                    } else {
                        let body = response.text().await.unwrap_or_default();
                        anyhow::bail!("news search failed with status {}: {}", status, body);
                    }
                }
                Err(e) => {
                    last_error = Some(anyhow::Error::new(e.without_url()).context("network error during news search"));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("unknown error after retries")))
    }
}
