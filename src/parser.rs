//! Reduces a raw showtimes payload into per-movie show records.

use crate::constants::UNKNOWN;
use crate::error::{Result, ScraperError};
use crate::types::{movie_label, round2, MovieGroups, RawPayload, ShowRecord};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Venue identity shared by every show of one payload.
#[derive(Debug, Clone)]
struct VenueIdentity {
    name: String,
    address: String,
    chain: String,
}

/// Parses one venue's payload, keeping only shows on `target_date`.
///
/// Missing sections yield an empty result. A show with malformed seat data is
/// skipped without affecting its siblings.
#[instrument(skip(payload))]
pub fn parse_payload(payload: &RawPayload, code: &str, target_date: &str) -> MovieGroups {
    let mut out = MovieGroups::new();

    let Some(block) = payload
        .get("ShowDetails")
        .and_then(Value::as_array)
        .and_then(|details| details.first())
    else {
        warn!("[EMPTY] {} (no show details)", code);
        return out;
    };

    let venue = read_venue(block.get("Venues").unwrap_or(&Value::Null));
    let mut valid = 0usize;

    for event in array_at(block, "Event") {
        let title = str_at(event, "EventTitle").unwrap_or(UNKNOWN);

        for child in array_at(event, "ChildEvents") {
            let label = movie_label(
                title,
                str_at(child, "EventDimension").unwrap_or_default(),
                str_at(child, "EventLanguage").unwrap_or_default(),
            );

            for show in array_at(child, "ShowTimes") {
                if show_date_code(show).as_deref() != Some(target_date) {
                    continue;
                }
                match parse_show(show, &venue) {
                    Ok(record) => {
                        valid += 1;
                        out.entry(label.clone()).or_default().push(record);
                    }
                    Err(e) => debug!("Skipping show for '{}': {}", label, e),
                }
            }
        }
    }

    if valid > 0 {
        info!("[FETCHED] {} | shows={}", code, valid);
    } else {
        warn!("[EMPTY] {}", code);
    }
    out
}

/// Total number of show records across all movies.
pub fn show_count(groups: &MovieGroups) -> usize {
    groups.values().map(Vec::len).sum()
}

fn read_venue(venues: &Value) -> VenueIdentity {
    VenueIdentity {
        name: str_at(venues, "VenueName").unwrap_or_default().to_string(),
        address: str_at(venues, "VenueAdd").unwrap_or_default().to_string(),
        chain: str_at(venues, "VenueCompName").unwrap_or(UNKNOWN).to_string(),
    }
}

/// `ShowDateCode` when present and non-empty, else the `YYYYMMDD` prefix of `ShowDateTime`.
fn show_date_code(show: &Value) -> Option<String> {
    if let Some(code) = show.get("ShowDateCode").and_then(scalar_to_string) {
        if !code.is_empty() {
            return Some(code);
        }
    }
    let combined = str_at(show, "ShowDateTime")?;
    Some(combined.chars().take(8).collect())
}

fn parse_show(show: &Value, venue: &VenueIdentity) -> Result<ShowRecord> {
    let mut total = 0i64;
    let mut available = 0i64;
    let mut sold = 0i64;
    let mut gross = 0f64;

    for category in array_at(show, "Categories") {
        let seats = int_field(category, "MaxSeats")?;
        let free = int_field(category, "SeatsAvail")?;
        let price = float_field(category, "CurPrice")?;
        let category_sold = seats
            .checked_sub(free)
            .ok_or_else(|| overflow("SeatsAvail", free))?;
        total = total.checked_add(seats).ok_or_else(|| overflow("MaxSeats", seats))?;
        available = available.checked_add(free).ok_or_else(|| overflow("SeatsAvail", free))?;
        sold = sold
            .checked_add(category_sold)
            .ok_or_else(|| overflow("MaxSeats", seats))?;
        gross += category_sold as f64 * price;
    }

    Ok(ShowRecord {
        venue: venue.name.clone(),
        address: venue.address.clone(),
        chain: venue.chain.clone(),
        time: show.get("ShowTime").and_then(scalar_to_string),
        session_id: show.get("SessionId").and_then(scalar_to_string),
        audi: str_at(show, "Attributes").unwrap_or_default().to_string(),
        total,
        available,
        sold,
        gross: round2(gross),
    })
}

fn overflow(key: &str, value: i64) -> ScraperError {
    ScraperError::ParseAnomaly(format!("{key}={value} overflows the seat totals"))
}

fn array_at<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter())
        .into_iter()
        .flatten()
}

fn str_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Seat counts arrive as numbers or numeric strings; missing counts are zero.
fn int_field(value: &Value, key: &str) -> Result<i64> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral_f64))
            .ok_or_else(|| ScraperError::ParseAnomaly(format!("{key}={n}"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ScraperError::ParseAnomaly(format!("{key}={s:?}"))),
        Some(other) => Err(ScraperError::ParseAnomaly(format!("{key}={other}"))),
    }
}

/// Whole floats inside the `i64` range; `2^63` itself is excluded.
fn integral_f64(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_finite() && f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

fn float_field(value: &Value, key: &str) -> Result<f64> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ScraperError::ParseAnomaly(format!("{key}={n}"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ScraperError::ParseAnomaly(format!("{key}={s:?}"))),
        Some(other) => Err(ScraperError::ParseAnomaly(format!("{key}={other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DATE: &str = "20250115";

    fn category(max: i64, avail: i64, price: f64) -> Value {
        json!({ "MaxSeats": max, "SeatsAvail": avail, "CurPrice": price })
    }

    fn payload_with_shows(shows: Vec<Value>) -> Value {
        json!({
            "ShowDetails": [{
                "Venues": { "VenueName": "PVR Phoenix", "VenueAdd": "Lower Parel", "VenueCompName": "PVR" },
                "Event": [{
                    "EventTitle": "Dune",
                    "ChildEvents": [{
                        "EventDimension": "IMAX 2D",
                        "EventLanguage": "English",
                        "ShowTimes": shows
                    }]
                }]
            }]
        })
    }

    #[test]
    fn test_missing_show_details_is_empty() {
        assert!(parse_payload(&json!({}), "PVRP", DATE).is_empty());
        assert!(parse_payload(&json!({ "ShowDetails": [] }), "PVRP", DATE).is_empty());
        assert!(parse_payload(&Value::Null, "PVRP", DATE).is_empty());
    }

    #[test]
    fn test_seat_and_gross_totals() {
        let payload = payload_with_shows(vec![json!({
            "ShowDateCode": DATE,
            "ShowTime": "10:30 AM",
            "SessionId": "1001",
            "Attributes": "AUDI 3",
            "Categories": [category(100, 40, 250.0), category(20, 5, 420.5)]
        })]);

        let groups = parse_payload(&payload, "PVRP", DATE);
        let shows = &groups["Dune [IMAX 2D | English]"];
        assert_eq!(shows.len(), 1);
        let show = &shows[0];
        assert_eq!(show.total, 120);
        assert_eq!(show.available, 45);
        assert_eq!(show.sold, 75);
        assert_eq!(show.sold, show.total - show.available);
        assert_eq!(show.gross, 60.0 * 250.0 + 15.0 * 420.5);
        assert_eq!(show.venue, "PVR Phoenix");
        assert_eq!(show.chain, "PVR");
        assert_eq!(show.audi, "AUDI 3");
        assert_eq!(show.time.as_deref(), Some("10:30 AM"));
        assert_eq!(show.session_id.as_deref(), Some("1001"));
    }

    #[test]
    fn test_off_date_show_excluded_while_sibling_kept() {
        let payload = payload_with_shows(vec![
            json!({ "ShowDateCode": DATE, "SessionId": "1", "Categories": [category(10, 5, 100.0)] }),
            json!({ "ShowDateCode": "20250116", "SessionId": "2", "Categories": [category(10, 0, 100.0)] }),
            json!({ "ShowDateCode": "20250114", "SessionId": "3", "Categories": [category(10, 0, 100.0)] }),
        ]);

        let groups = parse_payload(&payload, "PVRP", DATE);
        assert_eq!(show_count(&groups), 1);
        assert_eq!(groups[0][0].session_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_date_code_falls_back_to_date_time_prefix() {
        let payload = payload_with_shows(vec![
            json!({ "ShowDateTime": "202501151030", "SessionId": "a", "Categories": [] }),
            json!({ "ShowDateCode": "", "ShowDateTime": "202501151830", "SessionId": "b", "Categories": [] }),
            json!({ "ShowDateTime": "202501161030", "SessionId": "c", "Categories": [] }),
            json!({ "SessionId": "d", "Categories": [] }),
        ]);

        let groups = parse_payload(&payload, "PVRP", DATE);
        let ids: Vec<_> = groups[0].iter().map(|s| s.session_id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_missing_chain_defaults_to_unknown() {
        let payload = json!({
            "ShowDetails": [{
                "Venues": { "VenueName": "Single Screen", "VenueAdd": "MG Road" },
                "Event": [{
                    "EventTitle": "Dune",
                    "ChildEvents": [
                        { "ShowTimes": [{ "ShowDateCode": DATE, "Categories": [category(5, 5, 80.0)] }] },
                        { "EventLanguage": "Hindi", "ShowTimes": [{ "ShowDateCode": DATE, "Categories": [] }] }
                    ]
                }]
            }]
        });

        let groups = parse_payload(&payload, "SSMG", DATE);
        assert_eq!(groups.len(), 2);
        assert!(groups.contains_key("Dune"));
        assert!(groups.contains_key("Dune [Hindi]"));
        for show in groups.values().flatten() {
            assert_eq!(show.chain, "Unknown");
            assert_eq!(show.audi, "");
        }
    }

    #[test]
    fn test_string_numerics_and_malformed_show_skipped() {
        let payload = payload_with_shows(vec![
            json!({
                "ShowDateCode": DATE,
                "SessionId": "ok",
                "Categories": [{ "MaxSeats": "50", "SeatsAvail": "10", "CurPrice": "199.99" }]
            }),
            json!({
                "ShowDateCode": DATE,
                "SessionId": "bad",
                "Categories": [{ "MaxSeats": "many", "SeatsAvail": 0, "CurPrice": 100 }]
            }),
        ]);

        let groups = parse_payload(&payload, "PVRP", DATE);
        assert_eq!(show_count(&groups), 1);
        let show = &groups[0][0];
        assert_eq!(show.session_id.as_deref(), Some("ok"));
        assert_eq!(show.sold, 40);
        assert_eq!(show.gross, 7999.6);
    }

    #[test]
    fn test_seat_overflow_skips_only_that_show() {
        let payload = payload_with_shows(vec![
            json!({
                "ShowDateCode": DATE,
                "SessionId": "huge",
                "Categories": [
                    { "MaxSeats": i64::MAX, "SeatsAvail": 0, "CurPrice": 100 },
                    { "MaxSeats": 1, "SeatsAvail": 0, "CurPrice": 100 }
                ]
            }),
            json!({
                "ShowDateCode": DATE,
                "SessionId": "negative",
                "Categories": [{ "MaxSeats": i64::MIN, "SeatsAvail": 1, "CurPrice": 100 }]
            }),
            json!({ "ShowDateCode": DATE, "SessionId": "ok", "Categories": [category(10, 4, 50.0)] }),
        ]);

        let groups = parse_payload(&payload, "PVRP", DATE);
        assert_eq!(show_count(&groups), 1);
        assert_eq!(groups[0][0].session_id.as_deref(), Some("ok"));
        assert_eq!(groups[0][0].sold, 6);
    }

    #[test]
    fn test_fractional_and_out_of_range_seat_counts_rejected() {
        let category = json!({ "MaxSeats": 10.0, "SeatsAvail": 2.5, "CurPrice": 1 });
        assert_eq!(int_field(&category, "MaxSeats").unwrap(), 10);
        assert!(matches!(int_field(&category, "SeatsAvail"), Err(ScraperError::ParseAnomaly(_))));

        let huge = json!({ "MaxSeats": 1e19 });
        assert!(matches!(int_field(&huge, "MaxSeats"), Err(ScraperError::ParseAnomaly(_))));
        let payload = payload_with_shows(vec![json!({
            "ShowDateCode": DATE,
            "Categories": [{ "MaxSeats": 1e300, "SeatsAvail": 0, "CurPrice": 1 }]
        })]);
        assert!(parse_payload(&payload, "PVRP", DATE).is_empty());
    }

    #[test]
    fn test_gross_rounded_to_two_decimals() {
        let payload = payload_with_shows(vec![json!({
            "ShowDateCode": DATE,
            "Categories": [category(3, 0, 33.333)]
        })]);
        let groups = parse_payload(&payload, "PVRP", DATE);
        assert_eq!(groups[0][0].gross, 100.0);
    }

    #[test]
    fn test_movie_groups_keep_payload_order() {
        let payload = json!({
            "ShowDetails": [{
                "Venues": {},
                "Event": [
                    { "EventTitle": "Zeta", "ChildEvents": [{ "ShowTimes": [{ "ShowDateCode": DATE }] }] },
                    { "EventTitle": "Alpha", "ChildEvents": [{ "ShowTimes": [{ "ShowDateCode": DATE }] }] }
                ]
            }]
        });
        let groups = parse_payload(&payload, "X", DATE);
        let labels: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(labels, vec!["Zeta", "Alpha"]);
    }
}
