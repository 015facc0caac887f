use crate::constants::{DEFAULT_BASE_URL, IST_OFFSET_SECS};
use crate::error::{Result, ScraperError};
use chrono::{Duration as ChronoDuration, FixedOffset, NaiveDate, Utc};
use rand::Rng;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Must stay at 1: parallel fetching trips the upstream bot detection.
    pub worker_count: usize,
    pub base_url: String,
    pub api_timeout_seconds: u64,
    pub browser_timeout_seconds: u64,
    pub retry_sleep: SleepRange,
    pub fallback_sleep: SleepRange,
    /// `YYYYMMDD`; tomorrow in IST when unset.
    pub target_date_code: Option<String>,
    pub chrome_executable: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_timeout_seconds: 12,
            browser_timeout_seconds: 30,
            retry_sleep: SleepRange { min_secs: 0.8, max_secs: 1.5 },
            fallback_sleep: SleepRange { min_secs: 2.0, max_secs: 3.5 },
            target_date_code: None,
            chrome_executable: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub shard_id: u32,
    pub output_root: PathBuf,
    /// Write a snapshot of the outputs every N codes during the first pass; 0 disables.
    pub snapshot_interval: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            shard_id: 1,
            output_root: PathBuf::from("advance/data"),
            snapshot_interval: 25,
        }
    }
}

/// Inclusive range of seconds to wait before a retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SleepRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl SleepRange {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max_secs <= self.min_secs {
            return Duration::from_secs_f64(self.min_secs.max(0.0));
        }
        Duration::from_secs_f64(rng.gen_range(self.min_secs..=self.max_secs))
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.min_secs.is_finite() || !self.max_secs.is_finite() || self.min_secs < 0.0 {
            return Err(ScraperError::Config(format!("{name}: bounds must be finite and non-negative")));
        }
        if self.min_secs > self.max_secs {
            return Err(ScraperError::Config(format!(
                "{name}: min_secs {} exceeds max_secs {}",
                self.min_secs, self.max_secs
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Loads `config_path`, falling back to defaults when the file is absent.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", config_path.display(), e))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch.worker_count != 1 {
            return Err(ScraperError::Config(format!(
                "worker_count must be 1, got {}",
                self.fetch.worker_count
            )));
        }
        if self.fetch.api_timeout_seconds == 0 || self.fetch.browser_timeout_seconds == 0 {
            return Err(ScraperError::Config("timeouts must be positive".into()));
        }
        self.fetch.retry_sleep.validate("retry_sleep")?;
        self.fetch.fallback_sleep.validate("fallback_sleep")?;
        if let Some(code) = &self.fetch.target_date_code {
            validate_date_code(code)?;
        }
        Ok(())
    }

    /// The configured target date, or tomorrow in IST.
    pub fn target_date_code(&self) -> String {
        self.fetch
            .target_date_code
            .clone()
            .unwrap_or_else(|| ist_date_code(1))
    }
}

pub fn validate_date_code(code: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(code, "%Y%m%d")
        .ok()
        .filter(|_| code.len() == 8)
        .ok_or_else(|| ScraperError::Config(format!("invalid date code '{code}', expected YYYYMMDD")))
}

/// Today's date in IST shifted by `offset_days`, formatted `YYYYMMDD`.
pub fn ist_date_code(offset_days: i64) -> String {
    let ist = FixedOffset::east_opt(IST_OFFSET_SECS).expect("IST offset is in range");
    let today = Utc::now().with_timezone(&ist).date_naive();
    (today + ChronoDuration::days(offset_days)).format("%Y%m%d").to_string()
}
