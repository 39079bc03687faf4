//! Flattening of raw flight offers into table rows
//!
//! Offers arrive as nested JSON (offer → itineraries → segments, with fare
//! details listed separately per traveler). This module walks that structure and
//! emits one [`FlightRow`] per segment (granular) or per offer (summary).

use chrono::NaiveDateTime;
use serde::Deserialize;
use thiserror::Error;

use super::{FlightRow, RawOffer, TIMESTAMP_FORMAT};

/// How much detail to keep when flattening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlattenMode {
    /// One row per segment of every itinerary
    #[default]
    Granular,
    /// One row per offer, spanning first departure to final arrival
    Summary,
}

/// Errors raised while flattening an offer set
///
/// Any malformed offer fails the whole call; a partial table is never returned.
#[derive(Debug, Error)]
pub enum FlattenError {
    /// The offer does not have the expected shape
    #[error("Malformed offer #{index} (id {id}): {source}")]
    Malformed {
        index: usize,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A required element is missing from an otherwise well-formed offer
    #[error("Malformed offer #{index} (id {id}): {reason}")]
    MissingField {
        index: usize,
        id: String,
        reason: String,
    },

    /// A timestamp could not be parsed
    #[error("Malformed offer #{index} (id {id}): invalid timestamp '{value}'")]
    InvalidTimestamp {
        index: usize,
        id: String,
        value: String,
    },
}

// Every field below is required: a missing key fails the offer rather than
// becoming a default value in the table.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Offer {
    id: String,
    itineraries: Vec<Itinerary>,
    price: Price,
    traveler_pricings: Vec<TravelerPricing>,
    validating_airline_codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Itinerary {
    duration: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Segment {
    carrier_code: String,
    number_of_stops: u32,
    departure: Endpoint,
    arrival: Endpoint,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Endpoint {
    iata_code: String,
    at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Price {
    grand_total: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TravelerPricing {
    fare_details_by_segment: Vec<FareDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FareDetail {
    cabin: String,
    included_checked_bags: CheckedBags,
}

/// Checked baggage allowance. Amadeus gives either a piece count or a weight,
/// so both halves are optional; the object itself is not.
#[derive(Debug, Deserialize)]
struct CheckedBags {
    quantity: Option<u32>,
    weight: Option<u32>,
}

impl CheckedBags {
    /// Number of bags; a weight-only allowance counts as one bag
    fn count(&self) -> u32 {
        match (self.quantity, self.weight) {
            (Some(quantity), _) => quantity,
            (None, Some(_)) => 1,
            (None, None) => 0,
        }
    }
}

/// Flattens a set of raw offers into rows.
///
/// Airline names are left unresolved; see [`super::resolve_names`].
///
/// # Returns
/// * `Ok(Vec<FlightRow>)` with rows in offer order, then itinerary, then segment
/// * `Err(FlattenError)` for the first offer that is malformed
pub fn flatten(offers: &[RawOffer], mode: FlattenMode) -> Result<Vec<FlightRow>, FlattenError> {
    let mut rows = Vec::new();

    for (index, raw) in offers.iter().enumerate() {
        let offer = parse_offer(index, raw)?;
        match mode {
            FlattenMode::Granular => rows.extend(granular_rows(index, &offer)?),
            FlattenMode::Summary => rows.push(summary_row(index, &offer)?),
        }
    }

    Ok(rows)
}

fn parse_offer(index: usize, raw: &RawOffer) -> Result<Offer, FlattenError> {
    Offer::deserialize(raw).map_err(|source| FlattenError::Malformed {
        index,
        id: raw
            .get("id")
            .and_then(|id| id.as_str())
            .unwrap_or("?")
            .to_string(),
        source,
    })
}

/// One row per segment. Fare details are listed once per segment across all
/// itineraries, so they are matched with a running segment counter.
fn granular_rows(index: usize, offer: &Offer) -> Result<Vec<FlightRow>, FlattenError> {
    let fare_details = &offer
        .traveler_pricings
        .first()
        .ok_or_else(|| missing(index, offer, "travelerPricings is empty"))?
        .fare_details_by_segment;

    let mut rows = Vec::new();
    let mut fare_index = 0;

    for itinerary in &offer.itineraries {
        for segment in &itinerary.segments {
            let fare = fare_details.get(fare_index).ok_or_else(|| {
                missing(
                    index,
                    offer,
                    &format!("no fareDetailsBySegment entry for segment {}", fare_index),
                )
            })?;
            fare_index += 1;

            rows.push(FlightRow {
                id: offer.id.clone(),
                airline_code: segment.carrier_code.clone(),
                airline: None,
                stops: Some(segment.number_of_stops),
                origin: segment.departure.iata_code.clone(),
                destination: segment.arrival.iata_code.clone(),
                departure: parse_timestamp(index, offer, &segment.departure.at)?,
                arrival: parse_timestamp(index, offer, &segment.arrival.at)?,
                duration: Some(itinerary.duration.clone()),
                baggage: Some(fare.included_checked_bags.count()),
                cabin: Some(fare.cabin.clone()),
                price: offer.price.grand_total.clone(),
                currency: offer.price.currency.clone(),
            });
        }
    }

    Ok(rows)
}

/// One row per offer. The destination is the departure airport of the last
/// itinerary's first segment, which for a return trip is the outbound
/// destination.
fn summary_row(index: usize, offer: &Offer) -> Result<FlightRow, FlattenError> {
    let first_itinerary = offer
        .itineraries
        .first()
        .ok_or_else(|| missing(index, offer, "itineraries is empty"))?;
    let last_itinerary = offer
        .itineraries
        .last()
        .ok_or_else(|| missing(index, offer, "itineraries is empty"))?;

    let first_segment = first_itinerary
        .segments
        .first()
        .ok_or_else(|| missing(index, offer, "first itinerary has no segments"))?;
    let return_segment = last_itinerary
        .segments
        .first()
        .ok_or_else(|| missing(index, offer, "last itinerary has no segments"))?;
    let final_segment = last_itinerary
        .segments
        .last()
        .ok_or_else(|| missing(index, offer, "last itinerary has no segments"))?;

    let airline_code = offer
        .validating_airline_codes
        .first()
        .ok_or_else(|| missing(index, offer, "validatingAirlineCodes is empty"))?;

    Ok(FlightRow {
        id: offer.id.clone(),
        airline_code: airline_code.clone(),
        airline: None,
        stops: None,
        origin: first_segment.departure.iata_code.clone(),
        destination: return_segment.departure.iata_code.clone(),
        departure: parse_timestamp(index, offer, &first_segment.departure.at)?,
        arrival: parse_timestamp(index, offer, &final_segment.arrival.at)?,
        duration: None,
        baggage: None,
        cabin: None,
        price: offer.price.grand_total.clone(),
        currency: offer.price.currency.clone(),
    })
}

fn missing(index: usize, offer: &Offer, reason: &str) -> FlattenError {
    FlattenError::MissingField {
        index,
        id: offer.id.clone(),
        reason: reason.to_string(),
    }
}

fn parse_timestamp(index: usize, offer: &Offer, value: &str) -> Result<NaiveDateTime, FlattenError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|_| {
        FlattenError::InvalidTimestamp {
            index,
            id: offer.id.clone(),
            value: value.to_string(),
        }
    })
}
