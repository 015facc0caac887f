//! Retrieval metrics.
//!
//! Counters are recorded through the `metrics` facade; they only leave the
//! process when the Prometheus exporter is installed via [`init_metrics`].

use std::net::SocketAddr;
use tracing::{info, warn};

/// Which retrieval pass an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Direct,
    Retry,
    Browser,
}

impl Pass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pass::Direct => "direct",
            Pass::Retry => "retry",
            Pass::Browser => "browser",
        }
    }
}

pub struct RetrievalMetrics;

impl RetrievalMetrics {
    pub fn record_attempt(pass: Pass) {
        ::metrics::counter!("showtime_fetch_attempts_total", "pass" => pass.as_str()).increment(1);
    }

    pub fn record_fetched(pass: Pass, shows: usize) {
        ::metrics::counter!("showtime_fetch_success_total", "pass" => pass.as_str()).increment(1);
        ::metrics::histogram!("showtime_shows_per_venue").record(shows as f64);
    }

    pub fn record_empty(pass: Pass) {
        ::metrics::counter!("showtime_fetch_empty_total", "pass" => pass.as_str()).increment(1);
    }

    pub fn record_error(pass: Pass, transient: bool) {
        let kind = if transient { "transient" } else { "other" };
        ::metrics::counter!("showtime_fetch_error_total", "pass" => pass.as_str(), "kind" => kind)
            .increment(1);
    }

    pub fn record_unrecovered(count: usize) {
        ::metrics::gauge!("showtime_unrecovered_codes").set(count as f64);
    }
}

/// Installs the Prometheus exporter when `SHOWTIME_METRICS_PORT` is set.
pub fn init_metrics() {
    let Some(port) = std::env::var("SHOWTIME_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
    else {
        return;
    };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => warn!("Prometheus exporter install failed: {}", e),
    }
}
