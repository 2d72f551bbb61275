//! Quote API capability and its Yahoo Finance v8 chart implementation.
//!
//! The same endpoint serves both operations: `range=1d` for the current
//! price (`meta.regularMarketPrice`) and `period1`/`period2` for a daily
//! series.

use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::models::SeriesBar;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[async_trait]
pub trait QuoteApi: Send + Sync {
    async fn current_price(&self, symbol: &str) -> Result<f64, FetchError>;

    /// Daily bars for `start..=end`, oldest first.
    async fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesBar>, FetchError>;
}

// ── Wire format ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

// ── Yahoo client ──────────────────────────────────────────────────────────────

pub struct YahooQuoteApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl YahooQuoteApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .context("Failed to build quote API client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn chart_url(&self, symbol: &str, params: &[(&str, String)]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| api_err(symbol, e))?;
        url.path_segments_mut()
            .map_err(|_| api_err(symbol, "base URL cannot take a path"))?
            .push(symbol);
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    async fn get_chart(&self, symbol: &str, url: Url) -> Result<ChartData, FetchError> {
        debug!("GET {}", url);

        let resp = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        what: format!("quote API for {}", symbol),
                        after: self.timeout,
                    }
                } else {
                    api_err(symbol, e)
                }
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| api_err(symbol, e))?;

        // Yahoo answers unknown symbols with 404 and a JSON error body.
        let parsed = serde_json::from_str::<ChartResponse>(&body);
        match parsed {
            Ok(chart) => first_result(symbol, chart),
            Err(_) if !status.is_success() => Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            }),
            Err(e) => Err(FetchError::Decode {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

fn api_err(symbol: &str, reason: impl ToString) -> FetchError {
    FetchError::Api {
        symbol: symbol.to_string(),
        reason: reason.to_string(),
    }
}

fn first_result(symbol: &str, resp: ChartResponse) -> Result<ChartData, FetchError> {
    if let Some(err) = resp.chart.error {
        return Err(if err.code == "Not Found" {
            FetchError::SymbolNotFound(symbol.to_string())
        } else {
            api_err(symbol, format!("{}: {}", err.code, err.description))
        });
    }

    resp.chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| FetchError::SymbolNotFound(symbol.to_string()))
}

fn regular_market_price(symbol: &str, data: &ChartData) -> Result<f64, FetchError> {
    data.meta
        .as_ref()
        .and_then(|m| m.regular_market_price)
        .ok_or_else(|| FetchError::MissingPrice(symbol.to_string()))
}

fn bars_from_chart(symbol: &str, data: ChartData) -> Result<Vec<SeriesBar>, FetchError> {
    let timestamps = data.timestamp.unwrap_or_default();
    let indicators = data.indicators.ok_or_else(|| FetchError::Decode {
        symbol: symbol.to_string(),
        reason: "no indicators".into(),
    })?;

    let quote = indicators.quote.into_iter().next().unwrap_or_default();
    let adj = indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let at = |v: &[Option<f64>], i: usize| v.get(i).copied().flatten();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| FetchError::Decode {
                symbol: symbol.to_string(),
                reason: format!("invalid timestamp {}", ts),
            })?;

        let bar = SeriesBar {
            date,
            open: at(&quote.open, i),
            high: at(&quote.high, i),
            low: at(&quote.low, i),
            close: at(&quote.close, i),
            adj_close: at(&adj, i),
            volume: quote.volume.get(i).copied().flatten(),
        };

        // Holidays come back as all-null rows
        if bar.open.is_none() && bar.high.is_none() && bar.low.is_none() && bar.close.is_none() {
            continue;
        }
        bars.push(bar);
    }

    Ok(bars)
}

#[async_trait]
impl QuoteApi for YahooQuoteApi {
    async fn current_price(&self, symbol: &str) -> Result<f64, FetchError> {
        let url = self.chart_url(
            symbol,
            &[("interval", "1d".into()), ("range", "1d".into())],
        )?;
        let data = self.get_chart(symbol, url).await?;
        regular_market_price(symbol, &data)
    }

    async fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesBar>, FetchError> {
        let period1 = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive: move to the start of the day after `end`
        let period2 = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();

        let url = self.chart_url(
            symbol,
            &[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".into()),
                ("events", "history".into()),
                ("includeAdjustedClose", "true".into()),
            ],
        )?;

        let data = self.get_chart(symbol, url).await?;
        let mut bars = bars_from_chart(symbol, data)?;
        bars.retain(|b| b.date >= start && b.date <= end);
        Ok(bars)
    }
}
