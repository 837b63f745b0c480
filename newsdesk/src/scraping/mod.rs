use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{info, warn};

use crate::text::truncate_bytes;

pub mod webdriver;

/// One open headless-browser session.
#[async_trait::async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Rendered page markup, cut to at most `max_bytes`.
    async fn rendered_markup(&mut self, max_bytes: usize) -> Result<String>;

    /// Release the browser. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Opens browser sessions.
#[async_trait::async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// How long to let the page render and how much of it to read.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeSettings {
    pub wait: Duration,
    pub max_markup_bytes: usize,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(3),
            max_markup_bytes: 200_000,
        }
    }
}

/// Scrapes the readable text of an article through an open session.
/// Failures are logged and give an empty string.
pub async fn extract_text(session: &mut dyn BrowserSession, url: &str, settings: ScrapeSettings) -> String {
    match try_extract_text(session, url, settings).await {
        Ok(text) => {
            info!(url, chars = text.chars().count(), "scraping: done");
            text
        }
        Err(e) => {
            warn!(url, error = %e, "scraping: error loading page");
            String::new()
        }
    }
}

async fn try_extract_text(session: &mut dyn BrowserSession, url: &str, settings: ScrapeSettings) -> Result<String> {
    session.navigate(url).await?;
    tokio::time::sleep(settings.wait).await;
    let markup = session.rendered_markup(settings.max_markup_bytes).await?;
    let markup = truncate_bytes(&markup, settings.max_markup_bytes);
    Ok(paragraph_text(markup))
}

/// Paragraph text of a page: the `<p>`s of the first `<article>` (or
/// `role="main"` element) if there is one, otherwise every `<p>` in `<body>`.
/// Paragraphs are trimmed, blank ones dropped, the rest joined with `\n`.
pub fn paragraph_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let container = first_match(&document, "article")
        .or_else(|| first_match(&document, r#"[role="main"]"#))
        .or_else(|| first_match(&document, "body"));

    match container {
        Some(element) => paragraphs_in(element).join("\n"),
        None => String::new(),
    }
}

fn first_match<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    let found = document.select(&selector).next();
    found
}

fn paragraphs_in(element: ElementRef<'_>) -> Vec<String> {
    let Ok(p_selector) = Selector::parse("p") else {
        return Vec::new();
    };
    element
        .select(&p_selector)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}
