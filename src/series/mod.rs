//! Historical series fetch: symbol + date range → standalone CSV dataset.
//!
//! Independent of the daily run; the result is never merged into the
//! history table.

use crate::error::SeriesError;
use crate::quote_api::QuoteApi;
use crate::storage::PriceStore;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct SeriesFetcher {
    api: Arc<dyn QuoteApi>,
    store: PriceStore,
}

impl SeriesFetcher {
    pub fn new(api: Arc<dyn QuoteApi>, store: PriceStore) -> Self {
        Self { api, store }
    }

    /// Both dates are validated before any network call.
    pub async fn fetch_series(
        &self,
        symbol: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<PathBuf, SeriesError> {
        let start = parse_date("start_date", start_date)?;
        let end = parse_date("end_date", end_date)?;

        if start > end {
            return Err(SeriesError::DateOrder {
                start: start_date.to_string(),
                end: end_date.to_string(),
            });
        }

        info!("Fetching {} history {} → {}", symbol, start, end);
        let bars = self.api.history(symbol, start, end).await?;

        if bars.is_empty() {
            return Err(SeriesError::Empty {
                symbol: symbol.to_string(),
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        self.store
            .write_series(symbol, &bars)
            .map_err(SeriesError::Write)
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, SeriesError> {
    let value = value.trim();
    let invalid = || SeriesError::InvalidDate {
        field,
        value: value.to_string(),
    };

    if value.len() != 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())
}
