//! Wiring shared by the server binary and the probe binaries.

use anyhow::{Context, Result};
use common::{Config, LlmTask};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::llm::copywriter::SocialCopyGenerator;
use crate::llm::remote::RemoteLlmProvider;
use crate::llm::selector::Selector;
use crate::llm::summarizer::Summarizer;
use crate::llm::LlmProvider;
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::scraping::webdriver::WebDriverLauncher;
use crate::search::serpapi::SerpApiClient;
use crate::search::HeadlineSource;
use crate::storage::{DocumentStore, Persister};

const DEFAULT_LLM_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// `config.default.toml` (if present) merged with `--config` or `config.toml`,
/// then environment overrides, then validation.
pub async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = match explicit {
        Some(p) => {
            if !p.exists() {
                error!(path = ?p, "specified config file not found");
                anyhow::bail!("Config file not found: {}", p.display());
            }
            Some(p)
        }
        None => Some(PathBuf::from("config.toml")).filter(|p| p.exists()),
    };

    let mut config = Config::load_with_defaults(
        Some(default_path.as_path()).filter(|p| p.exists()),
        override_path.as_deref(),
    )
    .await?;
    config.apply_env_overrides()?;
    config.validate()?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

fn required_env(name: &str, what: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} API key env var '{}' not set", what, name))
}

/// OpenAI-compatible provider for one pipeline step.
pub fn llm_provider(config: &Config, task: LlmTask) -> Result<Arc<dyn LlmProvider>> {
    let endpoint = config.llm.endpoint(task);
    let key_env = endpoint.api_key_env.as_deref().unwrap_or(DEFAULT_LLM_KEY_ENV);
    let api_key = required_env(key_env, "LLM")?;
    let api_url = endpoint.api_url.as_deref().unwrap_or(common::DEFAULT_LLM_URL);
    let model = endpoint.model.as_deref().unwrap_or(common::DEFAULT_LLM_MODEL);

    let provider = RemoteLlmProvider::new(api_url, api_key, model).with_defaults(
        endpoint.timeout_seconds.unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
        endpoint.max_tokens,
        endpoint.temperature,
    );
    info!(?task, model, api_url, "LLM provider initialized");
    Ok(Arc::new(provider))
}

pub fn headline_source(config: &Config) -> Result<HeadlineSource> {
    let search = &config.search;
    let api_key = required_env(search.api_key_env(), "Search")?;
    let client = SerpApiClient::new(search.api_url(), api_key, search.timeout_seconds())?
        .with_locale(search.language(), search.region())
        .with_max_retries(search.max_retries());
    Ok(HeadlineSource::new(Arc::new(client)))
}

pub fn browser_launcher(config: &Config) -> Result<WebDriverLauncher> {
    let browser = &config.browser;
    Ok(WebDriverLauncher::new(browser.webdriver_url(), browser.timeout_seconds())?
        .with_headless(browser.headless()))
}

/// Production pipeline writing to `store`.
pub fn build_pipeline(config: &Config, store: Arc<dyn DocumentStore>) -> Result<Pipeline> {
    Ok(Pipeline::new(
        headline_source(config)?,
        Selector::new(llm_provider(config, LlmTask::Selection)?),
        Summarizer::new(llm_provider(config, LlmTask::Summarization)?),
        SocialCopyGenerator::new(llm_provider(config, LlmTask::Copywriting)?),
        Arc::new(browser_launcher(config)?),
        Persister::new(store),
        PipelineSettings::from_config(config),
    ))
}

/// Absolute DB path when it already exists, as given otherwise.
pub async fn resolve_db_path(path: &str) -> String {
    match tokio::fs::canonicalize(Path::new(path)).await {
        Ok(p) => p.to_string_lossy().to_string(),
        Err(_) => path.to_string(),
    }
}
