//! Price aggregation and bar classification for fare charts
//!
//! Flattened rows are reduced to a mean price per (departure date, arrival date)
//! pair. Each entry of the resulting table becomes one bar; the functions here
//! decide how each bar is highlighted so the rendering layer only maps classes
//! to colours.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use statrs::statistics::Statistics;
use thiserror::Error;

use crate::data::FlightRow;

/// Errors raised while aggregating prices
#[derive(Debug, Error, PartialEq)]
pub enum PriceError {
    /// A row's price is not a decimal number
    #[error("Invalid price '{price}' for offer {id}")]
    InvalidPrice { id: String, price: String },
}

/// Errors raised while classifying bars
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChartError {
    /// Grouped colouring needs at least two departure dates
    #[error("Grouped chart needs a departure range of at least 2 days, got {0}")]
    RangeTooShort(usize),
}

/// One aggregated bar: mean price of all rows departing and arriving on these dates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceEntry {
    #[serde(rename = "Departure")]
    pub departure: NaiveDate,
    #[serde(rename = "Arrival")]
    pub arrival: NaiveDate,
    #[serde(rename = "Mean Price")]
    pub mean_price: f64,
}

/// Mean prices ordered by (departure date, arrival date)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    entries: Vec<PriceEntry>,
}

impl PriceTable {
    pub fn entries(&self) -> &[PriceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mean price of the entry for this date pair, if any
    pub fn get(&self, departure: NaiveDate, arrival: NaiveDate) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.departure == departure && entry.arrival == arrival)
            .map(|entry| entry.mean_price)
    }

    /// Bars priced at or below this value count as cheap: mean minus one
    /// sample standard deviation. `NaN` when fewer than two entries exist.
    pub fn low_price_threshold(&self) -> f64 {
        let prices: Vec<f64> = self.entries.iter().map(|entry| entry.mean_price).collect();
        if prices.len() < 2 {
            return f64::NAN;
        }
        prices.iter().mean() - prices.iter().std_dev()
    }
}

impl FromIterator<PriceEntry> for PriceTable {
    fn from_iter<I: IntoIterator<Item = PriceEntry>>(iter: I) -> Self {
        let mut entries: Vec<PriceEntry> = iter.into_iter().collect();
        entries.sort_by_key(|entry| (entry.departure, entry.arrival));
        Self { entries }
    }
}

/// Parses a decimal price string such as `"812.43"`
pub fn parse_price(row: &FlightRow) -> Result<f64, PriceError> {
    row.price
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite())
        .ok_or_else(|| PriceError::InvalidPrice {
            id: row.id.clone(),
            price: row.price.clone(),
        })
}

/// Averages row prices per (departure date, arrival date), dropping time of day
pub fn aggregate(rows: &[FlightRow]) -> Result<PriceTable, PriceError> {
    let mut groups: BTreeMap<(NaiveDate, NaiveDate), Vec<f64>> = BTreeMap::new();

    for row in rows {
        let price = parse_price(row)?;
        groups
            .entry((row.departure.date(), row.arrival.date()))
            .or_default()
            .push(price);
    }

    Ok(groups
        .into_iter()
        .map(|((departure, arrival), prices)| PriceEntry {
            departure,
            arrival,
            mean_price: prices.iter().mean(),
        })
        .collect())
}

/// How bars are coloured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartMode {
    /// Highlight bars priced at or below mean minus one standard deviation
    #[default]
    LowestPrice,
    /// Colour consecutive runs of bars, one colour per run
    Grouped,
}

impl ChartMode {
    pub fn toggle(self) -> Self {
        match self {
            ChartMode::LowestPrice => ChartMode::Grouped,
            ChartMode::Grouped => ChartMode::LowestPrice,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChartMode::LowestPrice => "Lowest price",
            ChartMode::Grouped => "Grouped",
        }
    }
}

/// Highlight class of a single bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarClass {
    /// At or below the low-price threshold
    Below,
    /// Above the low-price threshold
    Above,
    /// Member of the n-th consecutive group
    Group(usize),
}

/// Classifies every entry of `table`, in table order.
///
/// In grouped mode the entries are split into runs of
/// `departure_range_length - 1` bars.
pub fn classify(
    table: &PriceTable,
    departure_range_length: usize,
    mode: ChartMode,
) -> Result<Vec<BarClass>, ChartError> {
    match mode {
        ChartMode::LowestPrice => {
            let threshold = table.low_price_threshold();
            Ok(table
                .entries()
                .iter()
                .map(|entry| {
                    if entry.mean_price <= threshold {
                        BarClass::Below
                    } else {
                        BarClass::Above
                    }
                })
                .collect())
        }
        ChartMode::Grouped => {
            if departure_range_length < 2 {
                return Err(ChartError::RangeTooShort(departure_range_length));
            }
            let chunk = departure_range_length - 1;
            Ok((0..table.len()).map(|i| BarClass::Group(i / chunk)).collect())
        }
    }
}
