//! One pass of the curation pipeline.
//!
//! Fetch headlines, let the model pick five, then for each pick in order:
//! resolve the story cluster, scrape it in one browser session, summarize,
//! write social copy and persist. Headlines are handled strictly one after
//! another and the browser session is closed before the next one starts.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::llm::copywriter::SocialCopyGenerator;
use crate::llm::selector::Selector;
use crate::llm::summarizer::Summarizer;
use crate::models::{Headline, NewsDocument, SupportingArticle};
use crate::scraping::{extract_text, BrowserLauncher, BrowserSession, ScrapeSettings};
use crate::search::HeadlineSource;
use crate::storage::Persister;
use crate::text::truncate_chars;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub topic_token: String,
    pub headline_limit: usize,
    pub supporting_per_headline: usize,
    pub max_combined_chars: usize,
    pub scrape: ScrapeSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            topic_token: common::DEFAULT_TOPIC_TOKEN.to_string(),
            headline_limit: 10,
            supporting_per_headline: 5,
            max_combined_chars: 5000,
            scrape: ScrapeSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &common::Config) -> Self {
        Self {
            topic_token: config.search.topic_token().to_string(),
            headline_limit: config.search.headline_limit(),
            supporting_per_headline: config.pipeline.supporting_per_headline(),
            max_combined_chars: config.pipeline.max_combined_chars(),
            scrape: ScrapeSettings {
                wait: std::time::Duration::from_secs(config.browser.wait_seconds()),
                max_markup_bytes: config.browser.max_markup_bytes(),
            },
        }
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Headlines left after filtering
    pub candidates: usize,
    pub selected: usize,
    pub persisted: usize,
    /// Headlines whose document could not be stored
    pub failed: usize,
}

pub struct Pipeline {
    headlines: HeadlineSource,
    selector: Selector,
    summarizer: Summarizer,
    copywriter: SocialCopyGenerator,
    browser: Arc<dyn BrowserLauncher>,
    persister: Persister,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        headlines: HeadlineSource,
        selector: Selector,
        summarizer: Summarizer,
        copywriter: SocialCopyGenerator,
        browser: Arc<dyn BrowserLauncher>,
        persister: Persister,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            headlines,
            selector,
            summarizer,
            copywriter,
            browser,
            persister,
            settings,
        }
    }

    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, topic = %self.settings.topic_token, "pipeline started");

        let mut report = RunReport {
            run_id,
            candidates: 0,
            selected: 0,
            persisted: 0,
            failed: 0,
        };

        let headlines = self
            .headlines
            .fetch(&self.settings.topic_token, self.settings.headline_limit)
            .await;
        report.candidates = headlines.len();
        if headlines.is_empty() {
            warn!(run_id = %run_id, "no headlines fetched, nothing to do");
            info!(run_id = %run_id, persisted = 0, "pipeline finished");
            return report;
        }

        let picks: Vec<&Headline> = self
            .selector
            .select_top(&headlines)
            .await
            .into_iter()
            .filter(|i| (1..=headlines.len()).contains(i))
            .map(|i| &headlines[i - 1])
            .collect();
        report.selected = picks.len();
        info!(run_id = %run_id, selected = picks.len(), of = headlines.len(), "headlines selected");

        for (position, headline) in picks.into_iter().enumerate() {
            info!(run_id = %run_id, position = position + 1, title = %headline.title, "processing headline");
            match self.process_headline(headline).await {
                Ok(id) => {
                    report.persisted += 1;
                    info!(run_id = %run_id, id, "headline stored");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(run_id = %run_id, title = %headline.title, error = %e, "failed to store headline");
                }
            }
        }

        info!(
            run_id = %run_id,
            persisted = report.persisted,
            failed = report.failed,
            "pipeline finished"
        );
        report
    }

    async fn process_headline(&self, headline: &Headline) -> anyhow::Result<i64> {
        let supporting = self.gather_supporting_articles(headline).await;

        let combined = supporting
            .iter()
            .map(|a| a.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let combined = truncate_chars(&combined, self.settings.max_combined_chars);

        let summary = self.summarizer.summarize_bilingual(combined).await;
        let ig_post = if summary.en.is_empty() {
            None
        } else {
            self.copywriter.derive_social_post(&summary.en).await
        };

        let document = NewsDocument::for_selected(headline, supporting, summary, ig_post);
        self.persister.insert(document).await
    }

    /// Scrape the headline's story cluster. Only articles with text are kept.
    async fn gather_supporting_articles(&self, headline: &Headline) -> Vec<SupportingArticle> {
        let Some(token) = headline.story_token() else {
            info!(title = %headline.title, "no story token, skipping supporting articles");
            return Vec::new();
        };

        let links = self
            .headlines
            .supporting_links(token, self.settings.supporting_per_headline)
            .await;
        if links.is_empty() {
            return Vec::new();
        }

        let mut session = match self.browser.launch().await {
            Ok(session) => session,
            Err(e) => {
                warn!(title = %headline.title, error = %e, "browser launch failed, no supporting articles");
                return Vec::new();
            }
        };

        let articles = self.scrape_links(session.as_mut(), links).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close browser session");
        }
        articles
    }

    async fn scrape_links(&self, session: &mut dyn BrowserSession, links: Vec<String>) -> Vec<SupportingArticle> {
        let mut articles = Vec::with_capacity(links.len());
        for link in links {
            let text = extract_text(session, &link, self.settings.scrape).await;
            let text = text.trim();
            if !text.is_empty() {
                articles.push(SupportingArticle {
                    link,
                    text: text.to_string(),
                });
            }
        }
        articles
    }
}
