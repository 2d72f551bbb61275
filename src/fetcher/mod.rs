//! Quote fetcher: one instrument → one price, via the scrape or API path.
//!
//! Never panics and never aborts a batch. Failures come back as
//! `Err(FetchError)`; the batch retriever turns them into "Error: …" strings.

use crate::config::BrowserConfig;
use crate::error::FetchError;
use crate::models::NOT_CONFIGURED;
use crate::quote_api::QuoteApi;
use crate::scraper::BrowserSession;
use crate::sources::{self, Source};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quote {
    Price(String),
    /// The source code is not in the registry.
    Unconfigured,
}

pub struct QuoteFetcher {
    api: Arc<dyn QuoteApi>,
    navigation_timeout: Duration,
    selector_timeout: Duration,
}

impl QuoteFetcher {
    pub fn new(api: Arc<dyn QuoteApi>, config: &BrowserConfig) -> Self {
        Self {
            api,
            navigation_timeout: config.navigation_timeout(),
            selector_timeout: config.selector_timeout(),
        }
    }

    pub async fn fetch(
        &self,
        source_code: &str,
        identifier: &str,
        session: &mut dyn BrowserSession,
    ) -> Result<Quote, FetchError> {
        match sources::resolve(source_code, identifier) {
            Some(Source::Api { symbol }) => {
                debug!("{}: quote API", symbol);
                let price = self.api.current_price(&symbol).await?;
                Ok(Quote::Price(price.to_string()))
            }
            Some(Source::Scrape { url, selector }) => {
                debug!("{}: scraping {} ({})", identifier, url, selector);
                session.navigate(&url, self.navigation_timeout).await?;
                session.wait_for(&selector, self.selector_timeout).await?;
                let text = session.extract_text(&selector).await?;
                Ok(Quote::Price(text.trim().to_string()))
            }
            None => {
                debug!("{}: source {:?} not configured", identifier, source_code);
                Ok(Quote::Unconfigured)
            }
        }
    }
}

/// Render a fetch outcome the way it is stored in the tables.
pub fn price_string(outcome: &Result<Quote, FetchError>) -> String {
    match outcome {
        Ok(Quote::Price(p)) => p.clone(),
        Ok(Quote::Unconfigured) => NOT_CONFIGURED.to_string(),
        Err(e) => e.to_price_string(),
    }
}
