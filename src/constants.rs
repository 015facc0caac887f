//! Constants shared by the fetch, parse and aggregation stages.

// Remote endpoint
pub const DEFAULT_BASE_URL: &str = "https://in.bookmyshow.com/api/v2/mobile/showtimes/byvenue";
pub const REQUEST_ORIGIN: &str = "https://in.bookmyshow.com";
pub const REQUEST_REFERER: &str = "https://in.bookmyshow.com/";
pub const ACCEPT_HEADER: &str = "application/json, text/plain, */*";

/// Desktop browser user agents rotated across requests.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 Chrome/119 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/118 Safari/537.36",
];

/// Inclusive bounds for each octet of a simulated client IP.
pub const IP_OCTET_MIN: u8 = 10;
pub const IP_OCTET_MAX: u8 = 240;

// Output schema
pub const SOURCE_TAG: &str = "BMS";
pub const UNKNOWN: &str = "Unknown";

// Occupancy classification thresholds (percent)
pub const HOUSEFULL_THRESHOLD: f64 = 98.0;
pub const FASTFILLING_THRESHOLD: f64 = 50.0;

/// The target date is computed in Indian Standard Time (UTC+05:30).
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

// Shard file naming
pub const SUMMARY_FILE_PREFIX: &str = "movie_summary";
pub const DETAILED_FILE_PREFIX: &str = "detailed";
pub const COMBINED_FILE_NAME: &str = "finaldetailed.json";

pub fn summary_file_name(shard_id: u32) -> String {
    format!("{SUMMARY_FILE_PREFIX}{shard_id}.json")
}

pub fn detailed_file_name(shard_id: u32) -> String {
    format!("{DETAILED_FILE_PREFIX}{shard_id}.json")
}
