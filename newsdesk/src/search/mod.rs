//! Candidate headlines from the news-search provider.
//!
//! The provider returns raw `news_results`; [`HeadlineSource`] turns them into
//! [`Headline`]s (highlight fields first, blacklist applied, story token
//! resolved) and resolves story tokens into supporting article links.
//! Provider failures never reach the caller: they are logged and yield an
//! empty list.

use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::Headline;

pub mod serpapi;

/// Title fragments that mark navigation blocks rather than news.
pub const BLACKLIST: &[&str] = &["top news", "posts on x", "frequently asked questions"];

pub fn is_blacklisted(title: &str) -> bool {
    let lower = title.to_lowercase();
    BLACKLIST.iter().any(|bad| lower.contains(bad))
}

/// What to ask the provider for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsQuery {
    /// A topic feed, e.g. Business
    Topic(String),
    /// Every article in one story cluster
    Story(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub news_results: Vec<RawNewsResult>,
    /// Set by the provider instead of an HTTP error in some cases
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNewsResult {
    #[serde(default)]
    pub highlight: Option<RawHighlight>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub source: Option<RawSource>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub story_token: Option<String>,
    #[serde(default)]
    pub stories: Option<Vec<RawStory>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHighlight {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub source: Option<RawSource>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub story_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSource {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStory {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub story_token: Option<String>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: NewsQuery) -> Result<SearchResponse>;
}

/// Wraps a [`SearchProvider`] with the headline filtering rules.
pub struct HeadlineSource {
    provider: Arc<dyn SearchProvider>,
}

impl HeadlineSource {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    /// Headlines for `topic_token`, from the first `limit` provider results, in provider order.
    pub async fn fetch(&self, topic_token: &str, limit: usize) -> Vec<Headline> {
        match self.provider.search(NewsQuery::Topic(topic_token.to_string())).await {
            Ok(response) => {
                let raw_count = response.news_results.len();
                let headlines = headlines_from_results(response.news_results, limit);
                info!(raw_count, kept = headlines.len(), "fetched headlines");
                headlines
            }
            Err(e) => {
                warn!(error = %e, "error fetching headlines");
                Vec::new()
            }
        }
    }

    /// Links of the first `limit` articles in a story cluster.
    pub async fn supporting_links(&self, story_token: &str, limit: usize) -> Vec<String> {
        match self.provider.search(NewsQuery::Story(story_token.to_string())).await {
            Ok(response) => response
                .news_results
                .into_iter()
                .take(limit)
                .filter_map(|r| r.link.map(|l| l.trim().to_string()))
                .filter(|l| is_web_link(l))
                .collect(),
            Err(e) => {
                warn!(error = %e, story_token, "error fetching supporting links");
                Vec::new()
            }
        }
    }
}

/// Only http(s) links can be opened in the browser.
fn is_web_link(link: &str) -> bool {
    url::Url::parse(link.trim())
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Apply the headline rules to raw results. Order is preserved.
pub fn headlines_from_results(results: Vec<RawNewsResult>, limit: usize) -> Vec<Headline> {
    results
        .into_iter()
        .take(limit)
        .filter_map(headline_from_result)
        .collect()
}

fn headline_from_result(result: RawNewsResult) -> Option<Headline> {
    let hl = result.highlight.unwrap_or_default();

    let title = first_present(hl.title.as_deref(), result.title.as_deref())
        .trim()
        .to_string();
    if title.is_empty() || is_blacklisted(&title) {
        return None;
    }

    let link = first_present(hl.link.as_deref(), result.link.as_deref()).to_string();
    let source = first_present(source_name(&hl.source), source_name(&result.source)).to_string();
    let published = first_present(hl.date.as_deref(), result.date.as_deref()).to_string();

    let story_token = match first_present(hl.story_token.as_deref(), result.story_token.as_deref()) {
        "" => story_token_from_related(result.stories.as_deref().unwrap_or_default()),
        token => token.to_string(),
    };

    Some(Headline {
        title,
        link,
        source,
        published,
        story_token,
    })
}

/// First related story with a token and a usable title.
fn story_token_from_related(stories: &[RawStory]) -> String {
    stories
        .iter()
        .find_map(|s| {
            let token = s.story_token.as_deref().filter(|t| !t.is_empty())?;
            let title = s.title.as_deref().unwrap_or_default().trim();
            (!title.is_empty() && !is_blacklisted(title)).then(|| token.to_string())
        })
        .unwrap_or_default()
}

fn source_name(source: &Option<RawSource>) -> Option<&str> {
    source.as_ref().and_then(|s| s.name.as_deref())
}

/// `a` unless it is missing or empty, then `b`, then "".
fn first_present<'a>(a: Option<&'a str>, b: Option<&'a str>) -> &'a str {
    a.filter(|s| !s.is_empty())
        .or(b.filter(|s| !s.is_empty()))
        .unwrap_or_default()
}
