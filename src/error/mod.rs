//! Typed failures for the fetch layer and the historical series path.
//!
//! Neither type ever escapes a batch: the retriever renders a `FetchError`
//! into the observation's price string, and the `history` command renders a
//! `SeriesError` the same way.

use crate::models::ERROR_PREFIX;
use std::time::Duration;
use thiserror::Error;

/// Why a single instrument could not be priced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("selector {selector:?} not found on {url}")]
    SelectorNotFound { selector: String, url: String },

    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("no page loaded in session")]
    NoPageLoaded,

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("quote API error for {symbol}: {reason}")]
    Api { symbol: String, reason: String },

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("no price field in response for {0}")]
    MissingPrice(String),

    #[error("could not decode response for {symbol}: {reason}")]
    Decode { symbol: String, reason: String },
}

impl FetchError {
    /// The string stored in place of a price.
    pub fn to_price_string(&self) -> String {
        format!("{} {}", ERROR_PREFIX, self)
    }
}

/// Failures of the ranged historical fetch.
#[derive(Error, Debug)]
pub enum SeriesError {
    #[error("invalid {field} {value:?}: expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("start_date {start} is after end_date {end}")]
    DateOrder { start: String, end: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("no historical data for {symbol} between {start} and {end}")]
    Empty {
        symbol: String,
        start: String,
        end: String,
    },

    #[error("could not write series file: {0:#}")]
    Write(anyhow::Error),
}

impl SeriesError {
    pub fn to_error_string(&self) -> String {
        format!("{} {}", ERROR_PREFIX, self)
    }
}
