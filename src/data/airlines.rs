//! Airline code reference table
//!
//! Maps two-letter carrier codes to human-readable names so the output table
//! shows "Qantas Airways" rather than "QF".

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::FlightRow;

/// Errors that can occur when loading the reference table
#[derive(Debug, Error)]
pub enum AirlineError {
    /// The file could not be opened or parsed
    #[error("Failed to read airline codes from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// A single record of the reference file
#[derive(Debug, Deserialize)]
struct AirlineRecord {
    #[serde(rename = "Airline Code")]
    code: String,
    #[serde(rename = "Airline")]
    name: String,
}

/// Static mapping from carrier code to carrier name
#[derive(Debug, Clone, Default)]
pub struct AirlineTable {
    names: HashMap<String, String>,
}

impl AirlineTable {
    /// Loads the table from a CSV file with `Airline Code` and `Airline` columns.
    /// Other columns are ignored.
    pub fn load(path: &Path) -> Result<Self, AirlineError> {
        let reader = csv::Reader::from_path(path).map_err(|source| AirlineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv(reader).map_err(|source| AirlineError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, csv::Error> {
        let mut names = HashMap::new();
        for record in reader.deserialize::<AirlineRecord>() {
            let record = record?;
            names.insert(record.code.trim().to_string(), record.name.trim().to_string());
        }
        Ok(Self { names })
    }

    /// Looks up the name for a carrier code
    pub fn name(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(String, String)> for AirlineTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// Returns a copy of `rows` with each airline name taken from `reference`.
///
/// Codes absent from the reference leave the name empty (left join).
pub fn resolve_names(rows: &[FlightRow], reference: &AirlineTable) -> Vec<FlightRow> {
    rows.iter()
        .map(|row| FlightRow {
            airline: reference.name(&row.airline_code).map(str::to_string),
            ..row.clone()
        })
        .collect()
}
