/*!
common/src/lib.rs

Shared configuration types and DB helper functions for Newsdesk.

This file provides:
- Config data structures (deserialized from TOML)
- A layered loader (default file + override file + environment)
- A helper to initialize an SQLite connection pool
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Google News "Business" topic.
pub const DEFAULT_TOPIC_TOKEN: &str = "CAAqJggKIiBDQkFTRWdvSUwyMHZNRGx1YlY4U0FtVnVHZ0pWVXlnQVAB";
pub const DEFAULT_SEARCH_URL: &str = "https://serpapi.com/search.json";
pub const DEFAULT_LLM_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "gpt-5-nano";
pub const DEFAULT_DB_PATH: &str = "data/newsdesk.db";

/// Database configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/newsdesk.db")
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_DB_PATH)
    }
}

/// HTTP control surface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

impl ServerConfig {
    pub fn bind(&self) -> &str {
        self.bind.as_deref().unwrap_or("0.0.0.0")
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(5000)
    }
}

/// News search provider (SerpApi google_news engine)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub topic_token: Option<String>,
    /// `hl` parameter
    pub language: Option<String>,
    /// `gl` parameter
    pub region: Option<String>,
    pub headline_limit: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub max_retries: Option<u32>,
}

impl SearchConfig {
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_SEARCH_URL)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or("SERPAPI_API_KEY")
    }

    pub fn topic_token(&self) -> &str {
        self.topic_token.as_deref().unwrap_or(DEFAULT_TOPIC_TOKEN)
    }

    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or("en")
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or("US")
    }

    pub fn headline_limit(&self) -> usize {
        self.headline_limit.unwrap_or(10)
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(15)
    }

    /// Attempts per search call, kept within 1..=10.
    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(3).clamp(1, 10)
    }
}

/// Remote LLM endpoint (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

/// Which pipeline step an LLM endpoint serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmTask {
    Selection,
    Summarization,
    Copywriting,
}

/// LLM top-level config: one fallback endpoint plus optional per-task overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    // Fallback: single remote config
    pub remote: Option<RemoteLlmConfig>,
    // Task-specific configs
    pub selection: Option<RemoteLlmConfig>,
    pub summarization: Option<RemoteLlmConfig>,
    pub copywriting: Option<RemoteLlmConfig>,
}

impl LlmConfig {
    /// Endpoint for a task. Task-specific fields win, unset ones fall back to `remote`.
    pub fn endpoint(&self, task: LlmTask) -> RemoteLlmConfig {
        let specific = match task {
            LlmTask::Selection => self.selection.as_ref(),
            LlmTask::Summarization => self.summarization.as_ref(),
            LlmTask::Copywriting => self.copywriting.as_ref(),
        };
        let base = self.remote.clone().unwrap_or_default();
        match specific {
            None => base,
            Some(s) => RemoteLlmConfig {
                api_url: s.api_url.clone().or(base.api_url),
                api_key_env: s.api_key_env.clone().or(base.api_key_env),
                model: s.model.clone().or(base.model),
                timeout_seconds: s.timeout_seconds.or(base.timeout_seconds),
                max_tokens: s.max_tokens.or(base.max_tokens),
                temperature: s.temperature.or(base.temperature),
            },
        }
    }
}

/// WebDriver-backed headless browser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub webdriver_url: Option<String>,
    pub headless: Option<bool>,
    pub wait_seconds: Option<u64>,
    pub max_markup_bytes: Option<usize>,
    pub timeout_seconds: Option<u64>,
}

impl BrowserConfig {
    pub fn webdriver_url(&self) -> &str {
        self.webdriver_url.as_deref().unwrap_or("http://localhost:4444")
    }

    pub fn headless(&self) -> bool {
        self.headless.unwrap_or(true)
    }

    pub fn wait_seconds(&self) -> u64 {
        self.wait_seconds.unwrap_or(3)
    }

    pub fn max_markup_bytes(&self) -> usize {
        self.max_markup_bytes.unwrap_or(200_000)
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(30)
    }
}

/// Per-run limits
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub supporting_per_headline: Option<usize>,
    pub max_combined_chars: Option<usize>,
    /// Number of documents shown by the control surface
    pub latest_limit: Option<i64>,
}

impl PipelineConfig {
    pub fn supporting_per_headline(&self) -> usize {
        self.supporting_per_headline.unwrap_or(5)
    }

    pub fn max_combined_chars(&self) -> usize {
        self.max_combined_chars.unwrap_or(5000)
    }

    pub fn latest_limit(&self) -> i64 {
        self.latest_limit.unwrap_or(20)
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Apply `DATABASE_PATH` and `PORT` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (the environment in production).
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("DATABASE_PATH").filter(|p| !p.trim().is_empty()) {
            self.database.path = Some(path);
        }
        if let Some(port) = lookup("PORT").filter(|p| !p.trim().is_empty()) {
            let port = port
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT is not a valid port number: {}", port))?;
            self.server.port = Some(port);
        }
        Ok(())
    }

    /// Check that every configured URL parses.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(self.search.api_url())
            .with_context(|| format!("invalid search.api_url: {}", self.search.api_url()))?;
        url::Url::parse(self.browser.webdriver_url())
            .with_context(|| format!("invalid browser.webdriver_url: {}", self.browser.webdriver_url()))?;
        for task in [LlmTask::Selection, LlmTask::Summarization, LlmTask::Copywriting] {
            if let Some(api_url) = self.llm.endpoint(task).api_url {
                url::Url::parse(&api_url)
                    .with_context(|| format!("invalid llm api_url for {:?}: {}", task, api_url))?;
            }
        }
        Ok(())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Initialize an SQLite connection pool.
///
/// This function will create the parent directory if necessary, ensure the DB file exists
/// (attempting to create it if missing), and return a configured `SqlitePool` with
/// at most 5 connections in WAL mode.
///
/// Example:
///   let pool = init_db_pool("data/newsdesk.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    // Creating the file up front surfaces permission problems before sqlx does.
    tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to create or open DB file: {}", path))?;

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").expect("parse empty config");
        assert_eq!(cfg.database.path(), DEFAULT_DB_PATH);
        assert_eq!(cfg.server.port(), 5000);
        assert_eq!(cfg.search.headline_limit(), 10);
        assert_eq!(cfg.search.topic_token(), DEFAULT_TOPIC_TOKEN);
        assert_eq!(cfg.browser.wait_seconds(), 3);
        assert_eq!(cfg.browser.max_markup_bytes(), 200_000);
        assert_eq!(cfg.pipeline.supporting_per_headline(), 5);
        assert_eq!(cfg.pipeline.max_combined_chars(), 5000);
        assert_eq!(cfg.pipeline.latest_limit(), 20);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn task_endpoint_falls_back_to_remote() {
        let toml = r#"
            [llm.remote]
            api_url = "http://localhost:11434/v1/chat/completions"
            api_key_env = "OPENAI_API_KEY"
            model = "gpt-5-nano"
            timeout_seconds = 60

            [llm.summarization]
            model = "gpt-5-mini"
            max_tokens = 2000
        "#;
        let cfg: Config = toml::from_str(toml).expect("parse config");

        let select = cfg.llm.endpoint(LlmTask::Selection);
        assert_eq!(select.model.as_deref(), Some("gpt-5-nano"));
        assert_eq!(select.max_tokens, None);

        let summarize = cfg.llm.endpoint(LlmTask::Summarization);
        assert_eq!(summarize.model.as_deref(), Some("gpt-5-mini"));
        assert_eq!(summarize.max_tokens, Some(2000));
        assert_eq!(summarize.timeout_seconds, Some(60));
        assert_eq!(summarize.api_key_env.as_deref(), Some("OPENAI_API_KEY"));
    }

    #[test]
    fn search_retries_are_bounded() {
        let mut search = SearchConfig::default();
        assert_eq!(search.max_retries(), 3);
        search.max_retries = Some(0);
        assert_eq!(search.max_retries(), 1);
        search.max_retries = Some(u32::MAX);
        assert_eq!(search.max_retries(), 10);
    }

    #[test]
    fn env_overrides_replace_path_and_port() {
        let vars: HashMap<&str, &str> = [("DATABASE_PATH", "/tmp/other.db"), ("PORT", "8080")].into();
        let mut cfg = Config::default();
        cfg.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .expect("apply overrides");
        assert_eq!(cfg.database.path(), "/tmp/other.db");
        assert_eq!(cfg.server.port(), 8080);
    }

    #[test]
    fn invalid_port_override_is_an_error() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_overrides_from(|k| (k == "PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn invalid_webdriver_url_fails_validation() {
        let mut cfg = Config::default();
        cfg.browser.webdriver_url = Some("not a url".to_string());
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn override_file_wins_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");
        std::fs::write(
            &default_path,
            "[search]\nheadline_limit = 10\nlanguage = \"en\"\n\n[server]\nport = 5000\n",
        )
        .expect("write default");
        std::fs::write(&override_path, "[search]\nheadline_limit = 7\n").expect("write override");

        let cfg = Config::load_with_defaults(Some(&default_path), Some(&override_path))
            .await
            .expect("load config");
        assert_eq!(cfg.search.headline_limit(), 7);
        assert_eq!(cfg.search.language(), "en");
        assert_eq!(cfg.server.port(), 5000);
    }

    #[tokio::test]
    async fn db_pool_creates_file_in_nested_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested").join("newsdesk.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = init_db_pool(&db_path_str).await.expect("init pool");
        let conn = pool.acquire().await.expect("acquire conn");
        drop(conn);
        assert!(db_path.exists());
    }
}
