//! Request identities and the per-worker session/browser handles.
//!
//! The upstream service fingerprints connection continuity, so each outbound
//! call carries a freshly randomized identity and a detected block is answered
//! by resetting the worker's session (and browser, if one was started).

use crate::browser::{BrowserLauncher, BrowserSession};
use crate::constants::{
    ACCEPT_HEADER, IP_OCTET_MAX, IP_OCTET_MIN, REQUEST_ORIGIN, REQUEST_REFERER, USER_AGENTS,
};
use crate::error::{Result, ScraperError};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Simulated client attributes attached to one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub user_agent: String,
    pub client_ip: Ipv4Addr,
    pub headers: Vec<(String, String)>,
}

impl RequestIdentity {
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ScraperError::Config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ScraperError::Config(format!("invalid header value '{value}': {e}")))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// Builds a randomized identity from the injected random source.
pub fn new_identity<R: Rng + ?Sized>(rng: &mut R) -> RequestIdentity {
    let user_agent = USER_AGENTS
        .choose(rng)
        .copied()
        .unwrap_or(USER_AGENTS[0])
        .to_string();
    let mut octet = || rng.gen_range(IP_OCTET_MIN..=IP_OCTET_MAX);
    let client_ip = Ipv4Addr::new(octet(), octet(), octet(), octet());
    let ip = client_ip.to_string();

    let headers = vec![
        (USER_AGENT.as_str().to_string(), user_agent.clone()),
        (ACCEPT.as_str().to_string(), ACCEPT_HEADER.to_string()),
        (ORIGIN.as_str().to_string(), REQUEST_ORIGIN.to_string()),
        (REFERER.as_str().to_string(), REQUEST_REFERER.to_string()),
        ("x-forwarded-for".to_string(), ip.clone()),
        ("client-ip".to_string(), ip),
    ];

    RequestIdentity { user_agent, client_ip, headers }
}

/// Session and browser handles owned by a single worker.
///
/// Both are created on first use and reused until [`WorkerSession::reset`].
pub struct WorkerSession {
    worker_id: usize,
    session: Option<reqwest::Client>,
    browser: Option<Box<dyn BrowserSession>>,
    launcher: Arc<dyn BrowserLauncher>,
}

impl WorkerSession {
    pub fn new(worker_id: usize, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            worker_id,
            session: None,
            browser: None,
            launcher,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    /// The worker's cookie-keeping HTTP client, created on first call.
    pub fn session(&mut self) -> Result<&reqwest::Client> {
        if self.session.is_none() {
            debug!(worker = self.worker_id, "Creating HTTP session");
            let client = reqwest::Client::builder()
                .cookie_store(true)
                .gzip(true)
                .build()?;
            self.session = Some(client);
        }
        self.session
            .as_ref()
            .ok_or_else(|| ScraperError::Config("HTTP session unavailable".into()))
    }

    /// The worker's headless browser, launched on first call.
    pub async fn browser(&mut self, user_agent: &str) -> Result<&mut (dyn BrowserSession + 'static)> {
        if self.browser.is_none() {
            debug!(worker = self.worker_id, "Launching browser session");
            let launched = self.launcher.launch(user_agent).await?;
            self.browser = Some(launched);
        }
        self.browser
            .as_deref_mut()
            .ok_or_else(|| ScraperError::Browser("browser session unavailable".into()))
    }

    /// Drops the HTTP session and closes the browser, ignoring close failures.
    pub async fn reset(&mut self) {
        self.session = None;
        if let Some(browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(worker = self.worker_id, "Ignoring browser close failure: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingLauncher {
        launched: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
        fail_close: bool,
    }

    struct FakeBrowser {
        closed: Arc<AtomicUsize>,
        fail_close: bool,
    }

    #[async_trait]
    impl BrowserSession for FakeBrowser {
        async fn fetch_body(&mut self, _url: &str, _timeout: Duration) -> Result<String> {
            Ok("{}".into())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(ScraperError::Browser("already gone".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl BrowserLauncher for CountingLauncher {
        async fn launch(&self, _user_agent: &str) -> Result<Box<dyn BrowserSession>> {
            self.launched.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeBrowser {
                closed: Arc::clone(&self.closed),
                fail_close: self.fail_close,
            }))
        }
    }

    fn worker(fail_close: bool) -> (WorkerSession, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let launched = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let launcher = CountingLauncher {
            launched: Arc::clone(&launched),
            closed: Arc::clone(&closed),
            fail_close,
        };
        (WorkerSession::new(0, Arc::new(launcher)), launched, closed)
    }

    #[test]
    fn test_identity_ip_octets_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let identity = new_identity(&mut rng);
            for octet in identity.client_ip.octets() {
                assert!((10..=240).contains(&octet), "octet {octet} out of range");
            }
            assert!(USER_AGENTS.contains(&identity.user_agent.as_str()));
        }
    }

    #[test]
    fn test_identity_headers_share_simulated_ip() {
        let mut rng = StdRng::seed_from_u64(1);
        let identity = new_identity(&mut rng);
        let map = identity.header_map().unwrap();
        let ip = identity.client_ip.to_string();
        assert_eq!(map.get("x-forwarded-for").unwrap(), ip.as_str());
        assert_eq!(map.get("client-ip").unwrap(), ip.as_str());
        assert_eq!(map.get(USER_AGENT).unwrap(), identity.user_agent.as_str());
        assert_eq!(map.get(ORIGIN).unwrap(), REQUEST_ORIGIN);
    }

    #[test]
    fn test_identity_is_deterministic_for_seed() {
        let a = new_identity(&mut StdRng::seed_from_u64(9));
        let b = new_identity(&mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_browser_is_launched_once_and_reused() {
        let (mut worker, launched, _) = worker(false);
        assert!(!worker.has_browser());
        worker.browser("ua").await.unwrap();
        worker.browser("ua").await.unwrap();
        assert_eq!(launched.load(Ordering::SeqCst), 1);
        assert!(worker.has_browser());
    }

    #[tokio::test]
    async fn test_reset_closes_browser_and_drops_session() {
        let (mut worker, launched, closed) = worker(false);
        worker.session().unwrap();
        worker.browser("ua").await.unwrap();

        worker.reset().await;
        assert!(!worker.has_session());
        assert!(!worker.has_browser());
        assert_eq!(closed.load(Ordering::SeqCst), 1);

        worker.browser("ua").await.unwrap();
        assert_eq!(launched.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reset_swallows_close_errors() {
        let (mut worker, _, closed) = worker(true);
        worker.browser("ua").await.unwrap();
        worker.reset().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(!worker.has_browser());
    }

    #[tokio::test]
    async fn test_reset_without_browser_never_launches_one() {
        let (mut worker, launched, closed) = worker(false);
        worker.session().unwrap();
        worker.reset().await;
        assert_eq!(launched.load(Ordering::SeqCst), 0);
        assert_eq!(closed.load(Ordering::SeqCst), 0);
    }
}
