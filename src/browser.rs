//! Headless browser used by the last-resort fetch pass.
//!
//! The browser loads the same JSON endpoint as the direct client, but inside a
//! real Chromium session, which the upstream anti-bot layer treats far more
//! leniently. It is slow and heavy, so it is launched lazily per worker.

use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// A running browser able to load a URL and hand back its rendered text.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate to `url` and return the rendered body text.
    async fn fetch_body(&mut self, url: &str, timeout: Duration) -> Result<String>;
    /// Shut the browser down.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Creates browser sessions on demand.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, user_agent: &str) -> Result<Box<dyn BrowserSession>>;
}

/// Launches headless Chromium via chromiumoxide.
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
}

impl ChromiumLauncher {
    /// `executable` overrides Chromium discovery; `None` lets chromiumoxide search the usual locations.
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, user_agent: &str) -> Result<Box<dyn BrowserSession>> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={user_agent}"));
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| ScraperError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScraperError::Browser(format!("failed to launch Chromium: {e}")))?;

        // The CDP handler must be polled for the browser to make progress
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        debug!("Launched headless Chromium");
        Ok(Box::new(ChromiumSession { browser, handler_task }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn fetch_body(&mut self, url: &str, timeout: Duration) -> Result<String> {
        let timed_out = || ScraperError::Timeout {
            url: url.to_string(),
            after_secs: timeout.as_secs(),
        };
        let deadline = Instant::now() + timeout;

        let page = tokio::time::timeout_at(deadline, self.browser.new_page(url))
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| ScraperError::Browser(format!("navigation failed: {e}")))?;

        // Chromium wraps a JSON document in <pre>; innerText yields the raw body
        let read = tokio::time::timeout_at(
            deadline,
            page.evaluate("document.body ? document.body.innerText : ''"),
        )
        .await;
        if let Err(e) = page.close().await {
            debug!("Failed to close page for {}: {}", url, e);
        }

        read.map_err(|_| timed_out())?
            .map_err(|e| ScraperError::Browser(format!("failed to read page body: {e}")))?
            .into_value()
            .map_err(|e| ScraperError::Browser(format!("page body was not a string: {e:?}")))
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        closed
            .map(|_| ())
            .map_err(|e| ScraperError::Browser(format!("failed to close Chromium: {e}")))
    }
}
