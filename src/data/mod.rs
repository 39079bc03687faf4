//! Core data models for fareview
//!
//! This module contains the query key that identifies a flight search, the flat
//! row type produced from raw offers, and the clients and transforms that move
//! data between them.

pub mod airlines;
pub mod amadeus;
pub mod flatten;

pub use airlines::{resolve_names, AirlineError, AirlineTable};
pub use amadeus::{AmadeusClient, ApiError, FlightSearch, Host};
pub use flatten::{flatten, FlattenError, FlattenMode};

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Largest party size the search API accepts
pub const MAX_ADULTS: u8 = 9;

/// One raw flight offer exactly as returned by the search API
pub type RawOffer = serde_json::Value;

/// Errors raised when building a query key
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryKeyError {
    /// Location code is not three ASCII letters
    #[error("Invalid IATA code: '{0}' (expected three letters, e.g. SYD)")]
    InvalidIata(String),

    /// Adult count outside the accepted range
    #[error("Invalid adult count: {0} (must be between 1 and 9)")]
    InvalidAdults(u8),
}

/// Identifies a single flight search and the cache entry that stores its result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    origin: String,
    destination: String,
    departure: NaiveDate,
    return_date: NaiveDate,
    adults: u8,
}

impl QueryKey {
    /// Builds a key, normalising location codes to upper case.
    ///
    /// # Returns
    /// * `Ok(QueryKey)` when both codes are valid IATA codes and `adults` is in range
    /// * `Err(QueryKeyError)` otherwise
    pub fn new(
        origin: &str,
        destination: &str,
        departure: NaiveDate,
        return_date: NaiveDate,
        adults: u8,
    ) -> Result<Self, QueryKeyError> {
        if !(1..=MAX_ADULTS).contains(&adults) {
            return Err(QueryKeyError::InvalidAdults(adults));
        }
        Ok(Self {
            origin: parse_iata(origin)?,
            destination: parse_iata(destination)?,
            departure,
            return_date,
            adults,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn departure(&self) -> NaiveDate {
        self.departure
    }

    pub fn return_date(&self) -> NaiveDate {
        self.return_date
    }

    pub fn adults(&self) -> u8 {
        self.adults
    }

    /// File name stem shared by the cache entry and the output table,
    /// e.g. `SYD-LON-D2023-03-15-R2023-07-26-Ad2`
    pub fn file_stem(&self) -> String {
        format!(
            "{}-{}-D{}-R{}-Ad{}",
            self.origin,
            self.destination,
            self.departure.format("%Y-%m-%d"),
            self.return_date.format("%Y-%m-%d"),
            self.adults
        )
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{} dep {} ret {} x{}",
            self.origin, self.destination, self.departure, self.return_date, self.adults
        )
    }
}

fn parse_iata(code: &str) -> Result<String, QueryKeyError> {
    let trimmed = code.trim();
    if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(trimmed.to_ascii_uppercase())
    } else {
        Err(QueryKeyError::InvalidIata(code.to_string()))
    }
}

/// One flattened record derived from a flight offer
///
/// Granular flattening produces one row per segment; summary flattening one row
/// per offer, leaving the per-segment fields empty. Serializes to the columns of
/// the output table, where the resolved airline name replaces the raw code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightRow {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(skip)]
    pub airline_code: String,
    /// Human-readable carrier name, `None` until resolved or when unknown
    #[serde(rename = "Airline")]
    pub airline: Option<String>,
    #[serde(rename = "Number of Stops")]
    pub stops: Option<u32>,
    #[serde(rename = "Origin")]
    pub origin: String,
    #[serde(rename = "Destination")]
    pub destination: String,
    #[serde(rename = "Departure", serialize_with = "serialize_timestamp")]
    pub departure: NaiveDateTime,
    #[serde(rename = "Arrival", serialize_with = "serialize_timestamp")]
    pub arrival: NaiveDateTime,
    /// ISO-8601 itinerary duration, e.g. `PT23H55M`
    #[serde(rename = "Duration")]
    pub duration: Option<String>,
    #[serde(rename = "Baggage")]
    pub baggage: Option<u32>,
    #[serde(rename = "Cabin")]
    pub cabin: Option<String>,
    /// Total price as the decimal string the API returned
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Currency")]
    pub currency: String,
}

/// Timestamps are written the way the API sends them
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn serialize_timestamp<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
}
