//! W3C WebDriver client (chromedriver, geckodriver, Selenium Grid).
//!
//! Only the four calls the scraper needs are implemented: new session,
//! navigate, page source and delete session.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{BrowserLauncher, BrowserSession};
use crate::text::truncate_bytes;

/// Starts headless Chrome sessions on a WebDriver endpoint.
pub struct WebDriverLauncher {
    client: Client,
    base_url: String,
    headless: bool,
}

impl WebDriverLauncher {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            headless: true,
        })
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    fn capabilities(&self) -> Value {
        let mut args = vec!["--no-sandbox", "--disable-dev-shm-usage", "--disable-gpu"];
        if self.headless {
            args.insert(0, "--headless");
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    value: Value,
    /// Legacy JSON wire protocol puts the id at the top level
    #[serde(default, rename = "sessionId")]
    session_id: Option<String>,
}

#[async_trait::async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        info!(endpoint = %self.base_url, "starting browser session");
        let response = self
            .client
            .post(format!("{}/session", self.base_url))
            .json(&self.capabilities())
            .send()
            .await
            .context("failed to reach WebDriver endpoint")?;
        let body = read_wire(response).await.context("WebDriver refused new session")?;

        let session_id = body
            .value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(body.session_id)
            .context("WebDriver new-session response has no sessionId")?;

        info!(session_id = %session_id, "browser session started");
        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session_id,
            closed: false,
        }))
    }
}

/// An open WebDriver session. Dropping it without `close` schedules a
/// best-effort delete on the current runtime.
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
    closed: bool,
}

impl WebDriverSession {
    fn url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.base_url, self.session_id, path)
    }
}

#[async_trait::async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/url"))
            .json(&json!({ "url": url }))
            .send()
            .await
            .context("WebDriver navigate request failed")?;
        read_wire(response)
            .await
            .with_context(|| format!("navigation to {} failed", url))?;
        Ok(())
    }

    async fn rendered_markup(&mut self, max_bytes: usize) -> Result<String> {
        let response = self
            .client
            .get(self.url("/source"))
            .send()
            .await
            .context("WebDriver page source request failed")?;
        let body = read_wire(response).await.context("WebDriver page source failed")?;
        let source = body
            .value
            .as_str()
            .context("WebDriver page source is not a string")?;
        Ok(truncate_bytes(source, max_bytes).to_string())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let response = self
            .client
            .delete(self.url(""))
            .send()
            .await
            .context("WebDriver delete session request failed")?;
        read_wire(response).await.context("WebDriver refused to close session")?;
        debug!(session_id = %self.session_id, "browser session closed");
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(session_id = %self.session_id, "browser session dropped without close, deleting in background");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let request = self.client.delete(self.url(""));
            handle.spawn(async move {
                let _ = request.send().await;
            });
        }
    }
}

/// Decode a WebDriver reply, turning `{"value": {"error": ..}}` into an error.
async fn read_wire(response: reqwest::Response) -> Result<WireResponse> {
    let status = response.status();
    let body: WireResponse = response
        .json()
        .await
        .with_context(|| format!("unreadable WebDriver response (status {})", status))?;

    if !status.is_success() || body.value.get("error").is_some() {
        let error = body.value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
        let message = body.value.get("message").and_then(Value::as_str).unwrap_or_default();
        anyhow::bail!("WebDriver error {} ({}): {}", status, error, message);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_flag_controls_args() {
        let launcher = WebDriverLauncher::new("http://localhost:4444/", 5).expect("launcher");
        assert_eq!(launcher.base_url, "http://localhost:4444");
        let caps = launcher.capabilities();
        let args = &caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"];
        assert_eq!(args[0], "--headless");

        let caps = launcher.with_headless(false).capabilities();
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        assert!(!args.iter().any(|a| a == "--headless"));
    }
}
