//! Folds per-venue show records into movie summaries and flat detail rows.

use crate::constants::{FASTFILLING_THRESHOLD, HOUSEFULL_THRESHOLD, SOURCE_TAG};
use crate::store::StoreSnapshot;
use crate::types::{
    occupancy_percent, round2, DetailedRecord, FillClass, MovieSummary, SummaryMap, VenueDirectory,
    VenueMeta,
};
use indexmap::{IndexMap, IndexSet};

/// Classifies a show by occupancy, housefull first.
pub fn classify(occupancy: f64) -> FillClass {
    if occupancy >= HOUSEFULL_THRESHOLD {
        FillClass::Housefull
    } else if occupancy >= FASTFILLING_THRESHOLD {
        FillClass::Fastfilling
    } else {
        FillClass::Normal
    }
}

#[derive(Debug, Default)]
struct MovieTotals {
    shows: u64,
    gross: f64,
    sold: i64,
    total_seats: i64,
    venues: IndexSet<String>,
    cities: IndexSet<String>,
    fastfilling: u64,
    housefull: u64,
}

impl MovieTotals {
    fn finish(self) -> MovieSummary {
        MovieSummary {
            shows: self.shows,
            gross: round2(self.gross),
            sold: self.sold,
            total_seats: self.total_seats,
            venues: self.venues.len(),
            cities: self.cities.len(),
            fastfilling: self.fastfilling,
            housefull: self.housefull,
            occupancy: round2(occupancy_percent(self.sold, self.total_seats)),
        }
    }
}

/// Output of one aggregation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub summary: SummaryMap,
    pub detailed: Vec<DetailedRecord>,
}

/// Builds the movie summary and the venue → movie → show ordered detail rows.
pub fn aggregate(results: &StoreSnapshot, venues: &VenueDirectory, target_date: &str) -> Aggregation {
    let mut totals: IndexMap<String, MovieTotals> = IndexMap::new();
    let mut detailed = Vec::new();
    let missing = VenueMeta::default();

    for (code, movies) in results {
        let meta = venues.get(code).unwrap_or(&missing);
        let city = meta.city_or_unknown();
        let state = meta.state_or_unknown();

        for (movie, shows) in movies {
            let entry = totals.entry(movie.clone()).or_default();
            entry.venues.insert(code.clone());
            entry.cities.insert(city.to_string());

            for show in shows {
                let occupancy = show.occupancy();

                entry.shows += 1;
                entry.gross += show.gross;
                entry.sold = entry.sold.saturating_add(show.sold);
                entry.total_seats = entry.total_seats.saturating_add(show.total);
                match classify(occupancy) {
                    FillClass::Housefull => entry.housefull += 1,
                    FillClass::Fastfilling => entry.fastfilling += 1,
                    FillClass::Normal => {}
                }

                detailed.push(DetailedRecord {
                    movie: movie.clone(),
                    city: city.to_string(),
                    state: state.to_string(),
                    venue: show.venue.clone(),
                    address: show.address.clone(),
                    time: show.time.clone(),
                    audi: show.audi.clone(),
                    session_id: show.session_id.clone(),
                    total_seats: show.total,
                    available: show.available,
                    sold: show.sold,
                    gross: show.gross,
                    occupancy: round2(occupancy),
                    source: SOURCE_TAG.to_string(),
                    date: target_date.to_string(),
                });
            }
        }
    }

    let summary = totals
        .into_iter()
        .map(|(movie, t)| (movie, t.finish()))
        .collect();

    Aggregation { summary, detailed }
}
