//! Pipeline orchestrator: instrument list → fetch → tables.
//!
//! ## Run
//!
//! `run()`: daily mode (default / cron use):
//!   1. Read the instrument list
//!   2. Fetch every instrument in order inside one browser session,
//!      writing `latest_<id>.price` as each one completes
//!   3. Overwrite the latest table and reconcile the history table
//!   Idempotent per day: re-running replaces that day's history rows.
//!
//! Failures are per instrument. A fetch error becomes an "Error: …" price and
//! the batch carries on; only local I/O errors stop a run.

use crate::config::AppConfig;
use crate::fetcher::{price_string, Quote, QuoteFetcher};
use crate::loader::load_instruments;
use crate::models::{InstrumentRef, Observation};
use crate::quote_api::{QuoteApi, YahooQuoteApi};
use crate::scraper::{Browser, BrowserSession, HttpBrowser};
use crate::storage::{PriceStore, ReconcileStats};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

// ── Batch retriever ───────────────────────────────────────────────────────────

pub struct BatchRetriever {
    browser: Arc<dyn Browser>,
    fetcher: QuoteFetcher,
    store: PriceStore,
}

impl BatchRetriever {
    pub fn new(browser: Arc<dyn Browser>, fetcher: QuoteFetcher, store: PriceStore) -> Self {
        Self {
            browser,
            fetcher,
            store,
        }
    }

    #[cfg(test)]
    pub async fn retrieve(&self, refs: &[InstrumentRef]) -> Result<Vec<Observation>> {
        self.retrieve_on(refs, Local::now().date_naive()).await
    }

    /// One observation per reference, in input order, all stamped `today`.
    pub async fn retrieve_on(
        &self,
        refs: &[InstrumentRef],
        today: NaiveDate,
    ) -> Result<Vec<Observation>> {
        self.store.ensure_dir()?;

        let mut session = self
            .browser
            .new_session()
            .await
            .context("Failed to open browser session")?;

        let result = self.fetch_all(refs, today, session.as_mut()).await;

        // Always release the session, even if a snapshot write failed.
        if let Err(e) = session.close().await {
            warn!("Browser session close failed: {:#}", e);
        }

        result
    }

    async fn fetch_all(
        &self,
        refs: &[InstrumentRef],
        today: NaiveDate,
        session: &mut dyn BrowserSession,
    ) -> Result<Vec<Observation>> {
        let mut observations = Vec::with_capacity(refs.len());

        for (i, r) in refs.iter().enumerate() {
            let outcome = self.fetcher.fetch(&r.source, &r.identifier, session).await;

            match &outcome {
                Ok(Quote::Price(p)) => info!("[{}/{}] {}: {}", i + 1, refs.len(), r.identifier, p),
                Ok(Quote::Unconfigured) => warn!(
                    "[{}/{}] {}: source {:?} not configured",
                    i + 1,
                    refs.len(),
                    r.identifier,
                    r.source
                ),
                Err(e) => warn!("[{}/{}] {}: {}", i + 1, refs.len(), r.identifier, e),
            }

            let price = price_string(&outcome);
            self.store
                .write_snapshot(&r.identifier, &price)
                .with_context(|| format!("snapshot for {}", r.identifier))?;

            observations.push(Observation::new(r.identifier.clone(), today, price));
        }

        Ok(observations)
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct Pipeline {
    config: AppConfig,
    browser: Arc<dyn Browser>,
    api: Arc<dyn QuoteApi>,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Result<Self> {
        let browser: Arc<dyn Browser> = Arc::new(HttpBrowser::new(&config.browser));
        let api: Arc<dyn QuoteApi> =
            Arc::new(YahooQuoteApi::new(&config.api).context("Failed to build quote API")?);
        Ok(Self::with_collaborators(config, browser, api))
    }

    pub fn with_collaborators(
        config: AppConfig,
        browser: Arc<dyn Browser>,
        api: Arc<dyn QuoteApi>,
    ) -> Self {
        Self {
            config,
            browser,
            api,
        }
    }

    pub fn store(&self) -> PriceStore {
        PriceStore::new(&self.config.storage)
    }

    pub fn retriever(&self) -> BatchRetriever {
        BatchRetriever::new(
            Arc::clone(&self.browser),
            QuoteFetcher::new(Arc::clone(&self.api), &self.config.browser),
            self.store(),
        )
    }

    pub async fn run(&self, funds_file: &Path) -> Result<RunStats> {
        self.run_on(funds_file, Local::now().date_naive()).await
    }

    pub async fn run_on(&self, funds_file: &Path, today: NaiveDate) -> Result<RunStats> {
        info!("=== Step 1: Reading instrument list ===");
        let refs = load_instruments(funds_file)?;

        info!("=== Step 2: Fetching prices ({} instruments) ===", refs.len());
        let observations = self.retriever().retrieve_on(&refs, today).await?;

        info!("=== Step 3: Writing tables ===");
        let history = self.store().reconcile_on(&observations, today)?;

        let stats = RunStats::tally(&observations, history);
        info!(
            "=== Done: {} instruments | {} priced | {} not configured | {} errors ===",
            stats.instruments, stats.priced, stats.unconfigured, stats.failed
        );
        Ok(stats)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub instruments: usize,
    pub priced: usize,
    pub unconfigured: usize,
    pub failed: usize,
    pub history: ReconcileStats,
}

impl RunStats {
    fn tally(observations: &[Observation], history: ReconcileStats) -> Self {
        let failed = observations.iter().filter(|o| o.is_error()).count();
        let unconfigured = observations.iter().filter(|o| o.is_unconfigured()).count();

        Self {
            instruments: observations.len(),
            priced: observations.len() - failed - unconfigured,
            unconfigured,
            failed,
            history,
        }
    }
}
