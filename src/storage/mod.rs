//! On-disk tables: latest prices, price history, per-fund snapshot files and
//! historical series datasets.
//!
//! ## History reconciliation
//!
//! Every run rewrites the history table as
//! `header + (existing rows whose Date != batch date) + batch rows`.
//! Batch rows are first reduced to one per (fund, date); a later repeat wins.
//! The discard key is the date alone: a same-day rerun drops *every* earlier
//! row for that day, including funds missing from the current batch. An empty
//! batch uses the fallback date (today) as the batch date.
//!
//! Kept rows are written back with their raw field bytes, valid UTF-8 or not. The history is read in full
//! before either table is touched, and each table is replaced via a
//! `<file>.tmp` sibling and a rename.
//!
//! No file locking: at most one run may touch the data dir at a time.

use crate::config::StorageConfig;
use crate::models::{HistoryStats, Observation, SeriesBar};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::ByteRecord;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const HEADER: [&str; 3] = ["Fund", "Date", "Price"];
const DATE_COLUMN: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Rows from earlier dates carried over unchanged
    pub kept: usize,
    /// Same-date rows dropped before appending the batch
    pub discarded: usize,
    pub appended: usize,
}

pub struct PriceStore {
    config: StorageConfig,
}

impl PriceStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn latest_path(&self) -> PathBuf {
        self.config.latest_path()
    }

    pub fn history_path(&self) -> PathBuf {
        self.config.history_path()
    }

    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(self.data_dir())
            .with_context(|| format!("Could not create dir {:?}", self.data_dir()))
    }

    // ── Snapshot files ────────────────────────────────────────────────────────

    /// `latest_<identifier>.price`. Identifiers are assumed unique per run.
    pub fn snapshot_path(&self, identifier: &str) -> PathBuf {
        self.data_dir()
            .join(format!("latest_{}.price", file_safe(identifier)))
    }

    pub fn write_snapshot(&self, identifier: &str, price: &str) -> Result<PathBuf> {
        let path = self.snapshot_path(identifier);
        std::fs::write(&path, format!("{}\n", price))
            .with_context(|| format!("Failed to write snapshot {:?}", path))?;
        Ok(path)
    }

    // ── Reconciliation ────────────────────────────────────────────────────────

    #[cfg(test)]
    pub fn reconcile(&self, observations: &[Observation]) -> Result<ReconcileStats> {
        self.reconcile_on(observations, chrono::Local::now().date_naive())
    }

    /// `fallback_date` is the batch date when `observations` is empty.
    ///
    /// Nothing is written until the existing history has been read. Each
    /// table is then replaced through a temp file + rename.
    pub fn reconcile_on(
        &self,
        observations: &[Observation],
        fallback_date: NaiveDate,
    ) -> Result<ReconcileStats> {
        self.ensure_dir()?;

        let batch_date = observations.first().map(|o| o.date).unwrap_or(fallback_date);
        let batch = dedup_batch(observations);
        if batch.len() < observations.len() {
            warn!(
                "Batch for {} had {} repeated (fund, date) rows; later ones win",
                batch_date,
                observations.len() - batch.len()
            );
        }

        let (kept, discarded) = self.read_history_except(batch_date)?;

        replace_table(&self.history_path(), |wtr| {
            for record in &kept {
                wtr.write_byte_record(record)?;
            }
            for o in &batch {
                write_observation(wtr, o)?;
            }
            Ok(())
        })?;

        replace_table(&self.latest_path(), |wtr| {
            for o in &batch {
                write_observation(wtr, o)?;
            }
            Ok(())
        })?;
        debug!("Wrote {} rows to {:?}", batch.len(), self.latest_path());

        let stats = ReconcileStats {
            kept: kept.len(),
            discarded,
            appended: batch.len(),
        };
        info!(
            "History for {}: {} kept, {} same-day rows replaced, {} appended",
            batch_date, stats.kept, stats.discarded, stats.appended
        );
        Ok(stats)
    }

    /// Raw history rows whose Date is not `batch_date`, plus the discard count.
    /// Rows are kept as bytes so they are written back exactly as found.
    fn read_history_except(&self, batch_date: NaiveDate) -> Result<(Vec<ByteRecord>, usize)> {
        let path = self.history_path();
        let batch_key = batch_date.to_string();

        let mut kept = Vec::new();
        let mut discarded = 0usize;

        if !path.exists() {
            return Ok((kept, discarded));
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("Failed to open {:?}", path))?;

        for result in rdr.byte_records() {
            let record = result.with_context(|| format!("Failed to read {:?}", path))?;
            if record.get(DATE_COLUMN).map(<[u8]>::trim_ascii) == Some(batch_key.as_bytes()) {
                discarded += 1;
            } else {
                kept.push(record);
            }
        }
        Ok((kept, discarded))
    }

    // ── Readers ───────────────────────────────────────────────────────────────

    pub fn read_latest(&self) -> Result<Vec<Observation>> {
        read_observations(&self.latest_path())
    }

    pub fn read_history(&self) -> Result<Vec<Observation>> {
        read_observations(&self.history_path())
    }

    pub fn history_stats(&self) -> Result<HistoryStats> {
        let rows = self.read_history()?;
        let funds: HashSet<&str> = rows.iter().map(|o| o.fund.as_str()).collect();

        Ok(HistoryStats {
            rows: rows.len(),
            funds: funds.len(),
            first_date: rows.iter().map(|o| o.date).min(),
            last_date: rows.iter().map(|o| o.date).max(),
        })
    }

    // ── Historical series ─────────────────────────────────────────────────────

    pub fn series_path(&self, symbol: &str) -> PathBuf {
        self.config
            .series_path()
            .join(format!("{}_history.csv", file_safe(symbol)))
    }

    pub fn write_series(&self, symbol: &str, bars: &[SeriesBar]) -> Result<PathBuf> {
        let dir = self.config.series_path();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Could not create dir {:?}", dir))?;

        let path = self.series_path(symbol);
        let mut wtr = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {:?}", path))?;
        for bar in bars {
            wtr.serialize(bar)?;
        }
        wtr.flush()
            .with_context(|| format!("Failed to write {:?}", path))?;

        info!("{}: {} bars written to {:?}", symbol, bars.len(), path);
        Ok(path)
    }
}

fn writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))
}

/// `<file>.tmp` next to `path`, so the final rename stays on one filesystem.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `HEADER` + rows into a temp file, then rename it over `path`.
/// On failure the temp file is removed and `path` is left as it was.
fn replace_table<F>(path: &Path, rows: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<std::fs::File>) -> Result<()>,
{
    let tmp = temp_path(path);

    let result = write_table(&tmp, rows).and_then(|()| {
        std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {:?}", path))
    });
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn write_table<F>(path: &Path, rows: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<std::fs::File>) -> Result<()>,
{
    let mut wtr = writer(path)?;
    wtr.write_record(HEADER)?;
    rows(&mut wtr)?;
    wtr.flush()
        .with_context(|| format!("Failed to write {:?}", path))
}

/// One row per (fund, date): a repeated key takes the later price but keeps
/// the position where the key first appeared.
fn dedup_batch(observations: &[Observation]) -> Vec<Observation> {
    let mut index: HashMap<(&str, NaiveDate), usize> = HashMap::new();
    let mut batch: Vec<Observation> = Vec::with_capacity(observations.len());

    for o in observations {
        match index.get(&(o.fund.as_str(), o.date)) {
            Some(&i) => batch[i].price = o.price.clone(),
            None => {
                index.insert((o.fund.as_str(), o.date), batch.len());
                batch.push(o.clone());
            }
        }
    }
    batch
}

fn write_observation(wtr: &mut csv::Writer<std::fs::File>, o: &Observation) -> Result<()> {
    wtr.write_record([o.fund.as_str(), &o.date.to_string(), o.price.as_str()])
        .with_context(|| format!("write row {} {}", o.fund, o.date))
}

/// Missing file reads as empty; malformed rows are skipped with a warning.
fn read_observations(path: &Path) -> Result<Vec<Observation>> {
    if !path.exists() {
        return Ok(vec![]);
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize::<Observation>().enumerate() {
        match result {
            Ok(o) => rows.push(o),
            Err(e) => warn!("Row {} in {:?}: {}", i + 1, path, e),
        }
    }
    Ok(rows)
}

/// Keep generated file names inside the data dir.
fn file_safe(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}
