use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Instrument reference ──────────────────────────────────────────────────────

/// One line of the instrument list: `source,identifier`.
/// The source code is kept verbatim; resolution happens in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentRef {
    pub source: String,
    pub identifier: String,
}

impl InstrumentRef {
    pub fn new(source: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            identifier: identifier.into(),
        }
    }
}

// ── Observation ───────────────────────────────────────────────────────────────

/// One row of the latest / history tables.
/// `price` is opaque: a displayed number, "N/A", or an "Error: …" string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Observation {
    #[serde(rename = "Fund")]
    pub fund: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Price")]
    pub price: String,
}

impl Observation {
    pub fn new(fund: impl Into<String>, date: NaiveDate, price: impl Into<String>) -> Self {
        Self {
            fund: fund.into(),
            date,
            price: price.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.price.starts_with(ERROR_PREFIX)
    }

    pub fn is_unconfigured(&self) -> bool {
        self.price == NOT_CONFIGURED
    }
}

/// Marker prepended to every failed fetch.
pub const ERROR_PREFIX: &str = "Error:";

/// Price recorded for an instrument whose source code is not configured.
pub const NOT_CONFIGURED: &str = "N/A";

// ── Historical series bar ─────────────────────────────────────────────────────

/// Daily OHLC bar from the quote API. Missing fields stay `None`
/// and are written as empty cells.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesBar {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: Option<f64>,
    #[serde(rename = "High")]
    pub high: Option<f64>,
    #[serde(rename = "Low")]
    pub low: Option<f64>,
    #[serde(rename = "Close")]
    pub close: Option<f64>,
    #[serde(rename = "Adj Close")]
    pub adj_close: Option<f64>,
    #[serde(rename = "Volume")]
    pub volume: Option<u64>,
}

// ── History summary ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub rows: usize,
    pub funds: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}
