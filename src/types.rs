use crate::constants::UNKNOWN;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Opaque venue identifier used to query the showtimes endpoint.
pub type TargetCode = String;

/// Raw showtimes payload as returned by the endpoint or the browser fallback.
pub type RawPayload = serde_json::Value;

/// One showtime at one venue, reduced to seat and revenue totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowRecord {
    pub venue: String,
    pub address: String,
    pub chain: String,
    pub time: Option<String>,
    pub session_id: Option<String>,
    pub audi: String,
    pub total: i64,
    pub available: i64,
    pub sold: i64,
    pub gross: f64,
}

impl ShowRecord {
    /// Percentage of seats sold; zero for a show with no seats.
    pub fn occupancy(&self) -> f64 {
        occupancy_percent(self.sold, self.total)
    }
}

/// Shows of one venue grouped by movie label, in payload order.
pub type MovieGroups = IndexMap<String, Vec<ShowRecord>>;

/// Builds the movie label: `title` or `title [dimension | language]`.
pub fn movie_label(title: &str, dimension: &str, language: &str) -> String {
    let suffix = [dimension.trim(), language.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    if suffix.is_empty() {
        title.to_string()
    } else {
        format!("{title} [{suffix}]")
    }
}

/// Location metadata for a venue, supplied by the venue list file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueMeta {
    #[serde(rename = "City", default)]
    pub city: Option<String>,
    #[serde(rename = "State", default)]
    pub state: Option<String>,
}

impl VenueMeta {
    pub fn city_or_unknown(&self) -> &str {
        self.city.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn state_or_unknown(&self) -> &str {
        self.state.as_deref().unwrap_or(UNKNOWN)
    }
}

/// Venue list keyed by code; key order is the fetch order.
pub type VenueDirectory = IndexMap<TargetCode, VenueMeta>;

/// Per-movie totals across every venue of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub shows: u64,
    pub gross: f64,
    pub sold: i64,
    #[serde(rename = "totalSeats")]
    pub total_seats: i64,
    pub venues: usize,
    pub cities: usize,
    pub fastfilling: u64,
    pub housefull: u64,
    pub occupancy: f64,
}

/// Movie summaries keyed by movie label, in first-seen order.
pub type SummaryMap = IndexMap<String, MovieSummary>;

/// One show flattened with its movie and venue location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedRecord {
    pub movie: String,
    pub city: String,
    pub state: String,
    pub venue: String,
    pub address: String,
    pub time: Option<String>,
    pub audi: String,
    pub session_id: Option<String>,
    #[serde(rename = "totalSeats")]
    pub total_seats: i64,
    pub available: i64,
    pub sold: i64,
    pub gross: f64,
    pub occupancy: f64,
    pub source: String,
    pub date: String,
}

/// Where a target code stands in the retrieval passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetrievalState {
    Unfetched,
    Fetched,
    Empty,
}

/// Operator classification of a show by occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillClass {
    Housefull,
    Fastfilling,
    Normal,
}

pub fn occupancy_percent(sold: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        sold as f64 / total as f64 * 100.0
    }
}

/// Two-decimal rounding with exact halves going to the even neighbour.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
