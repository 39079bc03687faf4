//! Date-range sweeps over the flight search
//!
//! A sweep runs one cached search per (departure date, return date) pair, in
//! departure-major order, and concatenates the flattened rows. The order matters:
//! grouped charts slice the aggregated table into fixed-size runs.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{CacheError, OfferCache};
use crate::data::{flatten, FlattenError, FlattenMode, FlightRow, FlightSearch, QueryKey, QueryKeyError};
use crate::prices::{aggregate, PriceError, PriceTable};

/// A failure during a sweep, tagged with the query it happened on
#[derive(Debug, Error)]
pub enum SweepError {
    /// The query parameters do not form a valid key
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryKeyError),

    /// Loading or fetching offers failed
    #[error("Fetching offers for {key} failed: {source}")]
    Fetch {
        key: QueryKey,
        #[source]
        source: CacheError,
    },

    /// The offers could not be flattened
    #[error("Flattening offers for {key} failed: {source}")]
    Flatten {
        key: QueryKey,
        #[source]
        source: FlattenError,
    },

    /// The swept rows could not be reduced to mean prices
    #[error("Aggregating prices for sweep {stem} failed: {source}")]
    Aggregate {
        stem: String,
        #[source]
        source: PriceError,
    },
}

/// Route and party shared by every query of a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub origin: String,
    pub destination: String,
    pub adults: u8,
}

impl Route {
    /// Query key for one date pair on this route
    pub fn key(&self, departure: NaiveDate, return_date: NaiveDate) -> Result<QueryKey, QueryKeyError> {
        QueryKey::new(&self.origin, &self.destination, departure, return_date, self.adults)
    }

    /// File name stem for a whole sweep, covering the first to last date on each
    /// side, e.g. `SYD-LON-D2023-03-15_2023-03-19-R2023-07-26_2023-07-26-Ad2`.
    /// `None` when either side has no dates.
    pub fn sweep_stem(&self, departure_dates: &[NaiveDate], return_dates: &[NaiveDate]) -> Option<String> {
        let span = |dates: &[NaiveDate]| -> Option<String> {
            Some(format!(
                "{}_{}",
                dates.first()?.format("%Y-%m-%d"),
                dates.last()?.format("%Y-%m-%d")
            ))
        };
        Some(format!(
            "{}-{}-D{}-R{}-Ad{}",
            self.origin.trim().to_ascii_uppercase(),
            self.destination.trim().to_ascii_uppercase(),
            span(departure_dates)?,
            span(return_dates)?,
            self.adults
        ))
    }
}

/// `days` consecutive dates starting at `start`
pub fn date_range(start: NaiveDate, days: usize) -> Vec<NaiveDate> {
    start.iter_days().take(days).collect()
}

/// Fetches (or loads) and flattens the offers for a single query
pub async fn fetch_rows<S: FlightSearch>(
    cache: &OfferCache<S>,
    key: &QueryKey,
    mode: FlattenMode,
) -> Result<Vec<FlightRow>, SweepError> {
    let offers = cache
        .get_or_fetch(key)
        .await
        .map_err(|source| SweepError::Fetch {
            key: key.clone(),
            source,
        })?;

    let rows = flatten(&offers, mode).map_err(|source| SweepError::Flatten {
        key: key.clone(),
        source,
    })?;
    debug!(key = %key, offers = offers.len(), rows = rows.len(), "flattened offers");

    Ok(rows)
}

/// Runs a granular search for every departure/return date pair.
///
/// Every key is validated before the first request, so a bad parameter never
/// leaves a half-finished sweep behind. The first failing pair aborts the sweep.
pub async fn sweep<S: FlightSearch>(
    cache: &OfferCache<S>,
    route: &Route,
    departure_dates: &[NaiveDate],
    return_dates: &[NaiveDate],
) -> Result<Vec<FlightRow>, SweepError> {
    let keys = departure_dates
        .iter()
        .flat_map(|departure| return_dates.iter().map(move |ret| (*departure, *ret)))
        .map(|(departure, ret)| route.key(departure, ret))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        origin = %route.origin,
        destination = %route.destination,
        queries = keys.len(),
        "starting sweep"
    );

    let mut table = Vec::new();
    for key in &keys {
        table.extend(fetch_rows(cache, key, FlattenMode::Granular).await?);
    }

    info!(rows = table.len(), "sweep complete");
    Ok(table)
}

/// Mean price per date pair over a sweep's rows, tagged with the sweep's stem
/// on failure
pub fn sweep_prices(stem: &str, rows: &[FlightRow]) -> Result<PriceTable, SweepError> {
    aggregate(rows).map_err(|source| SweepError::Aggregate {
        stem: stem.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheManager;
    use crate::data::{ApiError, RawOffer};
    use reqwest::StatusCode;
    use serde_json::json;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Records every key it is asked for and returns one single-segment
    /// round trip priced by departure day
    #[derive(Default)]
    struct RecordingSearch {
        seen: RefCell<Vec<QueryKey>>,
        fail_on: Option<NaiveDate>,
        malformed: bool,
    }

    impl FlightSearch for RecordingSearch {
        async fn search(&self, key: &QueryKey, currency: &str) -> Result<Vec<RawOffer>, ApiError> {
            self.seen.borrow_mut().push(key.clone());
            if self.fail_on == Some(key.departure()) {
                return Err(ApiError::SearchFailed {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    detail: "upstream timeout".to_string(),
                });
            }
            if self.malformed {
                return Ok(vec![json!({"id": "1", "itineraries": "nope"})]);
            }
            let dep = format!("{}T10:00:00", key.departure());
            let ret = format!("{}T10:00:00", key.return_date());
            let seg = |from: &str, to: &str, at: &str| {
                json!({
                    "carrierCode": "QF",
                    "numberOfStops": 0,
                    "departure": {"iataCode": from, "at": at},
                    "arrival": {"iataCode": to, "at": at}
                })
            };
            Ok(vec![json!({
                "id": "1",
                "itineraries": [
                    {"duration": "PT24H", "segments": [seg(key.origin(), key.destination(), &dep)]},
                    {"duration": "PT24H", "segments": [seg(key.destination(), key.origin(), &ret)]}
                ],
                "price": {"grandTotal": "500.00", "currency": currency},
                "validatingAirlineCodes": ["QF"],
                "travelerPricings": [{"fareDetailsBySegment": [
                    {"cabin": "ECONOMY", "includedCheckedBags": {"quantity": 1}},
                    {"cabin": "ECONOMY", "includedCheckedBags": {"quantity": 1}}
                ]}]
            })])
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn route() -> Route {
        Route {
            origin: "SYD".to_string(),
            destination: "LON".to_string(),
            adults: 2,
        }
    }

    fn create_cache(search: RecordingSearch) -> (OfferCache<RecordingSearch>, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let manager = CacheManager::with_dir(temp_dir.path().to_path_buf());
        (OfferCache::new(manager, search, "GBP"), temp_dir)
    }

    #[test]
    fn test_date_range_is_consecutive() {
        assert_eq!(
            date_range(date("2023-03-30"), 3),
            vec![date("2023-03-30"), date("2023-03-31"), date("2023-04-01")]
        );
        assert!(date_range(date("2023-03-30"), 0).is_empty());
    }

    #[test]
    fn test_sweep_stem_spans_both_ranges() {
        let route = Route {
            origin: "syd".to_string(),
            ..route()
        };
        let stem = route.sweep_stem(
            &date_range(date("2023-03-15"), 5),
            &date_range(date("2023-07-26"), 1),
        );
        assert_eq!(
            stem.as_deref(),
            Some("SYD-LON-D2023-03-15_2023-03-19-R2023-07-26_2023-07-26-Ad2")
        );
        assert!(route.sweep_stem(&[], &[date("2023-07-26")]).is_none());
    }

    #[tokio::test]
    async fn test_sweep_visits_pairs_departure_major() {
        let (cache, _temp_dir) = create_cache(RecordingSearch::default());
        let departures = date_range(date("2023-03-15"), 2);
        let returns = date_range(date("2023-07-26"), 3);

        let rows = sweep(&cache, &route(), &departures, &returns).await.unwrap();

        let seen: Vec<_> = cache
            .client()
            .seen
            .borrow()
            .iter()
            .map(|key| (key.departure(), key.return_date()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (date("2023-03-15"), date("2023-07-26")),
                (date("2023-03-15"), date("2023-07-27")),
                (date("2023-03-15"), date("2023-07-28")),
                (date("2023-03-16"), date("2023-07-26")),
                (date("2023-03-16"), date("2023-07-27")),
                (date("2023-03-16"), date("2023-07-28")),
            ]
        );

        // two segments per offer, one offer per pair
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].departure.date(), date("2023-03-15"));
        assert_eq!(rows[11].departure.date(), date("2023-07-28"));
    }

    #[tokio::test]
    async fn test_sweep_reuses_cache_on_second_run() {
        let (cache, _temp_dir) = create_cache(RecordingSearch::default());
        let departures = date_range(date("2023-03-15"), 2);
        let returns = date_range(date("2023-07-26"), 2);

        let first = sweep(&cache, &route(), &departures, &returns).await.unwrap();
        let second = sweep(&cache, &route(), &departures, &returns).await.unwrap();

        assert_eq!(cache.client().seen.borrow().len(), 4);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_sweep_aborts_with_failing_key() {
        let search = RecordingSearch {
            fail_on: Some(date("2023-03-16")),
            ..Default::default()
        };
        let (cache, _temp_dir) = create_cache(search);
        let departures = date_range(date("2023-03-15"), 3);
        let returns = date_range(date("2023-07-26"), 1);

        let err = sweep(&cache, &route(), &departures, &returns).await.unwrap_err();

        match &err {
            SweepError::Fetch { key, .. } => assert_eq!(key.departure(), date("2023-03-16")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("2023-03-16"));
        assert!(err.to_string().contains("Fetching offers"));
        // the third departure is never attempted
        assert_eq!(cache.client().seen.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_reports_flatten_stage() {
        let search = RecordingSearch {
            malformed: true,
            ..Default::default()
        };
        let (cache, _temp_dir) = create_cache(search);
        let dates = [date("2023-03-15")];

        let err = sweep(&cache, &route(), &dates, &[date("2023-07-26")])
            .await
            .unwrap_err();

        assert!(matches!(err, SweepError::Flatten { .. }));
        assert!(err.to_string().contains("Flattening offers for SYD->LON"));
    }

    #[tokio::test]
    async fn test_sweep_rejects_invalid_route_before_searching() {
        let (cache, _temp_dir) = create_cache(RecordingSearch::default());
        let bad_route = Route {
            origin: "SYDNEY".to_string(),
            ..route()
        };

        let err = sweep(&cache, &bad_route, &[date("2023-03-15")], &[date("2023-07-26")])
            .await
            .unwrap_err();

        assert!(matches!(err, SweepError::InvalidQuery(_)));
        assert!(cache.client().seen.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_rows_summary_mode() {
        let (cache, _temp_dir) = create_cache(RecordingSearch::default());
        let key = route().key(date("2023-03-15"), date("2023-07-26")).unwrap();

        let rows = fetch_rows(&cache, &key, FlattenMode::Summary).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].origin, "SYD");
        assert_eq!(rows[0].destination, "LON");
    }

    #[tokio::test]
    async fn test_sweep_prices_names_stage_and_sweep() {
        let (cache, _temp_dir) = create_cache(RecordingSearch::default());
        let departures = date_range(date("2023-03-15"), 2);
        let returns = [date("2023-07-26")];
        let stem = route().sweep_stem(&departures, &returns).unwrap();

        let mut rows = sweep(&cache, &route(), &departures, &returns).await.unwrap();
        assert_eq!(sweep_prices(&stem, &rows).unwrap().len(), 3);

        rows[1].price = "n/a".to_string();
        let err = sweep_prices(&stem, &rows).unwrap_err();

        assert!(matches!(err, SweepError::Aggregate { .. }));
        let message = err.to_string();
        assert!(message.starts_with("Aggregating prices for sweep SYD-LON-D2023-03-15_2023-03-16"));
        assert!(message.contains("Invalid price 'n/a'"));
    }
}
