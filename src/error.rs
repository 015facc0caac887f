use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The endpoint answered, but not with a JSON object. Block pages are
    /// served with a success status, so the body prefix is the only signal.
    #[error("Non-JSON response from {url}: {preview}")]
    NonJsonBody { url: String, preview: String },

    #[error("Request to {url} timed out after {after_secs}s")]
    Timeout { url: String, after_secs: u64 },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Malformed payload field: {0}")]
    ParseAnomaly(String),

    #[error("Failed to write {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScraperError {
    /// Failures that a later pass (retry or browser fallback) may recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScraperError::Http(_)
                | ScraperError::Json(_)
                | ScraperError::NonJsonBody { .. }
                | ScraperError::Timeout { .. }
                | ScraperError::Browser(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
