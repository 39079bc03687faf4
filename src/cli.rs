//! Command-line interface parsing for fareview
//!
//! This module handles parsing of CLI arguments using clap and turns them,
//! together with the API credentials, into the [`Config`] the rest of the
//! program is built from.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

use crate::cache::CacheManager;
use crate::data::Host;
use crate::prices::ChartMode;
use crate::secrets::{Credentials, SecretError, SecretProvider};
use crate::sweep::Route;

/// Cache directory used when no platform cache directory can be determined
const FALLBACK_CACHE_DIR: &str = "data/query";

/// Error types for turning CLI arguments into a configuration
#[derive(Debug, Error)]
pub enum CliError {
    /// API credentials could not be retrieved
    #[error("Could not load API credentials: {0}")]
    Credentials(#[from] SecretError),

    /// A sweep needs at least one date on each side
    #[error("--{0} must be at least 1")]
    EmptyRange(&'static str),
}

/// fareview - search flight offers and chart fares across travel dates
#[derive(Parser, Debug)]
#[command(name = "fareview")]
#[command(about = "Search flight offers, cache them, and chart fares across date ranges")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Directory for cached search responses [default: platform cache dir]
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Directory for output tables
    #[arg(long, global = true, value_name = "DIR", default_value = "data/output")]
    pub output_dir: PathBuf,

    /// CSV file mapping "Airline Code" to "Airline"
    #[arg(long, global = true, value_name = "FILE", default_value = "data/airline_codes.csv")]
    pub airlines: PathBuf,

    /// Currency to price offers in
    #[arg(long, global = true, default_value = "GBP")]
    pub currency: String,

    /// Use the production API instead of the test environment
    #[arg(long, global = true)]
    pub production: bool,

    /// Log debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// What to run
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run a single search and write its flattened offers
    ///
    /// Examples:
    ///   fareview search
    ///   fareview search --origin MEL --destination LHR --summary
    Search {
        #[command(flatten)]
        query: QueryArgs,

        /// One row per offer instead of one row per segment
        #[arg(long)]
        summary: bool,
    },
    /// Search every departure/return date pair and chart the fares
    ///
    /// Examples:
    ///   fareview sweep --departure-days 5 --return-days 3
    ///   fareview sweep --chart grouped
    Sweep {
        #[command(flatten)]
        query: QueryArgs,

        /// Number of consecutive departure dates, starting at --departure
        #[arg(long, default_value_t = 5)]
        departure_days: usize,

        /// Number of consecutive return dates, starting at --return
        #[arg(long, default_value_t = 1)]
        return_days: usize,

        /// How to colour the fare chart
        #[arg(long, value_enum, default_value_t = ChartArg::Lowest)]
        chart: ChartArg,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Search {
            query: QueryArgs::default(),
            summary: false,
        }
    }
}

/// Route, dates, and party size of a search
#[derive(Args, Debug, Clone, PartialEq)]
pub struct QueryArgs {
    /// Origin IATA code
    #[arg(long, default_value = "SYD")]
    pub origin: String,

    /// Destination IATA code
    #[arg(long, default_value = "LON")]
    pub destination: String,

    /// Departure date (YYYY-MM-DD)
    #[arg(long, default_value = "2023-03-15")]
    pub departure: NaiveDate,

    /// Return date (YYYY-MM-DD)
    #[arg(long = "return", default_value = "2023-07-26")]
    pub return_date: NaiveDate,

    /// Number of adult travellers
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=9))]
    pub adults: u8,
}

impl Default for QueryArgs {
    fn default() -> Self {
        Self {
            origin: "SYD".to_string(),
            destination: "LON".to_string(),
            departure: NaiveDate::from_ymd_opt(2023, 3, 15).unwrap_or_default(),
            return_date: NaiveDate::from_ymd_opt(2023, 7, 26).unwrap_or_default(),
            adults: 2,
        }
    }
}

impl QueryArgs {
    pub fn route(&self) -> Route {
        Route {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            adults: self.adults,
        }
    }
}

/// Chart choice on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartArg {
    /// Highlight the cheapest date pairs
    Lowest,
    /// Colour runs of consecutive date pairs
    Grouped,
    /// Skip the chart
    None,
}

impl ChartArg {
    pub fn mode(self) -> Option<ChartMode> {
        match self {
            ChartArg::Lowest => Some(ChartMode::LowestPrice),
            ChartArg::Grouped => Some(ChartMode::Grouped),
            ChartArg::None => None,
        }
    }
}

/// Everything the program needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub host: Host,
    pub currency: String,
    pub cache: CacheManager,
    pub output_dir: PathBuf,
    pub airlines_path: PathBuf,
    pub command: Command,
}

impl Config {
    /// Builds the configuration from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(Config)` when credentials are available and ranges are valid
    /// * `Err(CliError)` otherwise; credentials are checked first
    pub fn from_cli(cli: &Cli, secrets: &impl SecretProvider) -> Result<Self, CliError> {
        let credentials = Credentials::fetch(secrets)?;
        let command = cli.command.clone().unwrap_or_default();

        if let Command::Sweep {
            departure_days,
            return_days,
            ..
        } = &command
        {
            if *departure_days == 0 {
                return Err(CliError::EmptyRange("departure-days"));
            }
            if *return_days == 0 {
                return Err(CliError::EmptyRange("return-days"));
            }
        }

        let cache = match &cli.cache_dir {
            Some(dir) => CacheManager::with_dir(dir.clone()),
            None => CacheManager::new()
                .unwrap_or_else(|| CacheManager::with_dir(PathBuf::from(FALLBACK_CACHE_DIR))),
        };

        Ok(Config {
            credentials,
            host: if cli.production {
                Host::Production
            } else {
                Host::Test
            },
            currency: cli.currency.trim().to_ascii_uppercase(),
            cache,
            output_dir: cli.output_dir.clone(),
            airlines_path: cli.airlines.clone(),
            command,
        })
    }
}
