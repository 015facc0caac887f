//! Three-pass retrieval over the venue list.
//!
//! Pass 1 fetches every code directly. Codes that come back empty or fail are
//! retried in pass 2 with a fresh identity after a jittered pause, and
//! whatever is still empty is loaded through the headless browser in pass 3.
//! Codes are processed one at a time; a failing code never stops the run.

use crate::config::{Config, SleepRange};
use crate::error::Result;
use crate::fetch::ShowtimeFetcher;
use crate::metrics::{Pass, RetrievalMetrics};
use crate::parser::{parse_payload, show_count};
use crate::store::ResultStore;
use crate::types::TargetCode;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub target_date: String,
    pub retry_sleep: SleepRange,
    pub fallback_sleep: SleepRange,
    /// Invoke the snapshot hook every N codes of pass 1; 0 disables.
    pub snapshot_interval: usize,
}

impl RetrievalSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_date: config.target_date_code(),
            retry_sleep: config.fetch.retry_sleep,
            fallback_sleep: config.fetch.fallback_sleep,
            snapshot_interval: config.output.snapshot_interval,
        }
    }
}

/// Outcome counts of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub fetched_direct: usize,
    pub recovered_retry: usize,
    pub recovered_browser: usize,
    pub still_empty: Vec<TargetCode>,
}

impl RunReport {
    pub fn recovered(&self) -> usize {
        self.fetched_direct + self.recovered_retry + self.recovered_browser
    }
}

pub struct RetrievalEngine<F: ShowtimeFetcher> {
    fetcher: F,
    settings: RetrievalSettings,
    rng: StdRng,
}

impl<F: ShowtimeFetcher> RetrievalEngine<F> {
    pub fn new(fetcher: F, settings: RetrievalSettings) -> Self {
        Self {
            fetcher,
            settings,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Runs all three passes over `codes`, recording outcomes in `store`.
    ///
    /// `on_snapshot` is called periodically during pass 1; its error aborts the run.
    #[instrument(skip_all, fields(codes = codes.len(), date = %self.settings.target_date))]
    pub async fn run<S>(&mut self, codes: &[TargetCode], store: &ResultStore, mut on_snapshot: S) -> Result<RunReport>
    where
        S: FnMut(&ResultStore) -> Result<()>,
    {
        let mut report = RunReport { total: codes.len(), ..Default::default() };

        info!("PASS 1 - direct ({} codes)", codes.len());
        for (idx, code) in codes.iter().enumerate() {
            if self.attempt(Pass::Direct, code, store).await {
                report.fetched_direct += 1;
            }
            let interval = self.settings.snapshot_interval;
            if interval > 0 && (idx + 1) % interval == 0 {
                on_snapshot(store)?;
            }
        }

        let retry = store.empty_codes();
        info!("PASS 2 - retry ({} codes)", retry.len());
        for code in &retry {
            tokio::time::sleep(self.settings.retry_sleep.sample(&mut self.rng)).await;
            self.fetcher.reset_identity().await;
            if self.attempt(Pass::Retry, code, store).await {
                report.recovered_retry += 1;
            }
        }

        let fallback = store.empty_codes();
        info!("PASS 3 - browser ({} codes)", fallback.len());
        for (idx, code) in fallback.iter().enumerate() {
            info!("[BROWSER {}/{}] {}", idx + 1, fallback.len(), code);
            tokio::time::sleep(self.settings.fallback_sleep.sample(&mut self.rng)).await;
            self.fetcher.reset_identity().await;
            if self.attempt(Pass::Browser, code, store).await {
                report.recovered_browser += 1;
                info!("[RECOVERED via browser] {}", code);
            }
        }

        // Close the browser if pass 3 started one
        self.fetcher.reset_identity().await;

        report.still_empty = store.empty_codes();
        RetrievalMetrics::record_unrecovered(report.still_empty.len());
        info!(
            total = report.total,
            recovered = report.recovered(),
            still_empty = report.still_empty.len(),
            "Retrieval finished"
        );
        Ok(report)
    }

    /// One fetch + parse for `code`. Returns true when the code ends up fetched.
    async fn attempt(&mut self, pass: Pass, code: &str, store: &ResultStore) -> bool {
        RetrievalMetrics::record_attempt(pass);
        let fetched = match pass {
            Pass::Direct | Pass::Retry => self.fetcher.fetch_direct(code).await,
            Pass::Browser => self.fetcher.fetch_via_browser(code).await,
        };

        match fetched {
            Ok(payload) => {
                let groups = parse_payload(&payload, code, &self.settings.target_date);
                if groups.is_empty() {
                    RetrievalMetrics::record_empty(pass);
                    if pass == Pass::Direct {
                        store.reserve_empty(code);
                    } else {
                        store.mark_empty(code);
                    }
                    false
                } else {
                    RetrievalMetrics::record_fetched(pass, show_count(&groups));
                    store.record_fetched(code, groups);
                    true
                }
            }
            Err(e) => {
                warn!(code, pass = pass.as_str(), "Fetch failed: {}", e);
                RetrievalMetrics::record_error(pass, e.is_transient());
                store.mark_empty(code);
                false
            }
        }
    }
}
