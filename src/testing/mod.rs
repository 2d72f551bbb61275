//! In-memory stand-ins for the browser and quote API, shared by unit tests.

use crate::error::FetchError;
use crate::models::SeriesBar;
use crate::quote_api::QuoteApi;
use crate::scraper::parsers::{first_text, has_match};
use crate::scraper::{Browser, BrowserSession};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Browser ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct BrowserLog {
    opened: usize,
    closed: usize,
    visited: Vec<String>,
}

/// Serves canned pages keyed by URL. Unknown URLs fail navigation.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    pages: HashMap<String, Result<String, FetchError>>,
    log: Arc<Mutex<BrowserLog>>,
}

impl FakeBrowser {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(html.to_string()));
        self
    }

    pub fn with_failure(mut self, url: &str, err: FetchError) -> Self {
        self.pages.insert(url.to_string(), Err(err));
        self
    }

    pub fn visited(&self) -> Vec<String> {
        self.log.lock().unwrap().visited.clone()
    }

    pub fn opened(&self) -> usize {
        self.log.lock().unwrap().opened
    }

    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>> {
        self.log.lock().unwrap().opened += 1;
        Ok(Box::new(FakeSession {
            browser: self.clone(),
            current: None,
        }))
    }
}

struct FakeSession {
    browser: FakeBrowser,
    current: Option<(String, String)>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), FetchError> {
        self.browser.log.lock().unwrap().visited.push(url.to_string());
        self.current = None;
        match self.browser.pages.get(url) {
            Some(Ok(html)) => {
                self.current = Some((url.to_string(), html.clone()));
                Ok(())
            }
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".into(),
            }),
        }
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), FetchError> {
        let (url, html) = self.current.as_ref().ok_or(FetchError::NoPageLoaded)?;
        if has_match(html, selector)? {
            Ok(())
        } else {
            Err(FetchError::Timeout {
                what: format!("selector {} on {}", selector, url),
                after: timeout,
            })
        }
    }

    async fn extract_text(&mut self, selector: &str) -> Result<String, FetchError> {
        let (url, html) = self.current.as_ref().ok_or(FetchError::NoPageLoaded)?;
        first_text(html, selector)?.ok_or_else(|| FetchError::SelectorNotFound {
            selector: selector.to_string(),
            url: url.clone(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.browser.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

// ── Quote API ─────────────────────────────────────────────────────────────────

/// Unknown symbols answer `SymbolNotFound`.
#[derive(Default)]
pub struct FakeApi {
    prices: HashMap<String, f64>,
    series: HashMap<String, Vec<SeriesBar>>,
    calls: AtomicUsize,
}

impl FakeApi {
    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }

    pub fn with_series(mut self, symbol: &str, bars: Vec<SeriesBar>) -> Self {
        self.series.insert(symbol.to_string(), bars);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteApi for FakeApi {
    async fn current_price(&self, symbol: &str) -> Result<f64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| FetchError::SymbolNotFound(symbol.to_string()))
    }

    async fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesBar>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let bars = self
            .series
            .get(symbol)
            .ok_or_else(|| FetchError::SymbolNotFound(symbol.to_string()))?;
        Ok(bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect())
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}
