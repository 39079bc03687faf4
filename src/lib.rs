//! fareview library
//!
//! Flight offer search with an on-disk response cache, flattening of offers into
//! table rows, date-range sweeps, and fare aggregation for charting. The modules
//! are exposed for the binary and for integration tests.

pub mod app;
pub mod cache;
pub mod cli;
pub mod data;
pub mod prices;
pub mod report;
pub mod secrets;
pub mod sweep;
pub mod ui;
