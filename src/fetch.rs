//! Transport for the showtimes endpoint: direct HTTP and browser-mediated.

use crate::browser::BrowserLauncher;
use crate::config::FetchConfig;
use crate::error::{Result, ScraperError};
use crate::identity::{new_identity, WorkerSession};
use crate::types::RawPayload;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Url;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Source of raw showtime payloads for one venue code.
#[async_trait]
pub trait ShowtimeFetcher: Send {
    /// Plain HTTP GET. Non-JSON bodies and timeouts are errors.
    async fn fetch_direct(&mut self, code: &str) -> Result<RawPayload>;

    /// Same endpoint loaded in a headless browser. Non-JSON bodies yield an empty payload.
    async fn fetch_via_browser(&mut self, code: &str) -> Result<RawPayload>;

    /// Discard the session and any browser so the next call starts fresh.
    async fn reset_identity(&mut self);
}

/// The venue-by-date endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base_url: String,
    date_code: String,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, date_code: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            date_code: date_code.into(),
        }
    }

    pub fn url_for(&self, code: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.base_url,
            &[("venueCode", code), ("dateCode", self.date_code.as_str())],
        )
        .map_err(|e| ScraperError::Config(format!("invalid base_url '{}': {}", self.base_url, e)))
    }
}

/// Accepts a body only if its first non-whitespace character opens a JSON object.
///
/// The upstream serves block pages as HTML with a 200 status, so the status
/// code cannot be trusted and the body prefix is checked instead.
pub fn sniff_json(body: &str, url: &str) -> Result<RawPayload> {
    let trimmed = body.trim_start();
    if !trimmed.starts_with('{') {
        return Err(ScraperError::NonJsonBody {
            url: url.to_string(),
            preview: trimmed.chars().take(80).collect(),
        });
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Live fetcher backed by one worker's session and browser.
pub struct HttpShowtimeFetcher {
    endpoint: Endpoint,
    worker: WorkerSession,
    api_timeout: Duration,
    browser_timeout: Duration,
    rng: StdRng,
}

impl HttpShowtimeFetcher {
    pub fn new(config: &FetchConfig, date_code: &str, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            endpoint: Endpoint::new(config.base_url.clone(), date_code),
            worker: WorkerSession::new(0, launcher),
            api_timeout: Duration::from_secs(config.api_timeout_seconds),
            browser_timeout: Duration::from_secs(config.browser_timeout_seconds),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }
}

#[async_trait]
impl ShowtimeFetcher for HttpShowtimeFetcher {
    #[instrument(skip(self))]
    async fn fetch_direct(&mut self, code: &str) -> Result<RawPayload> {
        let url = self.endpoint.url_for(code)?;
        let identity = new_identity(&mut self.rng);
        let headers = identity.header_map()?;
        let timeout = self.api_timeout;
        let timed_out = |e: reqwest::Error| {
            if e.is_timeout() {
                ScraperError::Timeout { url: url.to_string(), after_secs: timeout.as_secs() }
            } else {
                ScraperError::Http(e)
            }
        };

        let client = self.worker.session()?;
        let response = client
            .get(url.clone())
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(timed_out)?;
        debug!(status = response.status().as_u16(), ip = %identity.client_ip, "Direct response");
        let body = response.text().await.map_err(timed_out)?;
        sniff_json(&body, url.as_str())
    }

    #[instrument(skip(self))]
    async fn fetch_via_browser(&mut self, code: &str) -> Result<RawPayload> {
        let url = self.endpoint.url_for(code)?;
        let identity = new_identity(&mut self.rng);
        let timeout = self.browser_timeout;

        let browser = self.worker.browser(&identity.user_agent).await?;
        let body = browser.fetch_body(url.as_str(), timeout).await?;
        match sniff_json(&body, url.as_str()) {
            Err(ScraperError::NonJsonBody { preview, .. }) => {
                debug!("Browser body was not JSON: {}", preview);
                Ok(Value::Object(Map::new()))
            }
            other => other,
        }
    }

    async fn reset_identity(&mut self) {
        self.worker.reset().await;
    }
}
