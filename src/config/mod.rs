use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub input: InputConfig,
}

/// Page-automation session settings (scrape sources)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default = "default_browser_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    #[serde(default = "default_selector_timeout_secs")]
    pub selector_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

/// Quote API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_browser_user_agent")]
    pub user_agent: String,
}

/// Where the tables and side files live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_latest_file")]
    pub latest_file: String,

    #[serde(default = "default_history_file")]
    pub history_file: String,

    #[serde(default = "default_series_dir")]
    pub series_dir: String,
}

/// Instrument list location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default = "default_funds_file")]
    pub funds_file: PathBuf,
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.selector_timeout_secs)
    }
}

impl StorageConfig {
    pub fn latest_path(&self) -> PathBuf {
        self.data_dir.join(&self.latest_file)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.history_file)
    }

    pub fn series_path(&self) -> PathBuf {
        self.data_dir.join(&self.series_dir)
    }

    /// Storage rooted at `data_dir` with default file names.
    #[cfg(test)]
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_browser_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36"
        .to_string()
}
fn default_navigation_timeout_secs() -> u64 {
    30
}
fn default_selector_timeout_secs() -> u64 {
    60
}
fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_api_base_url() -> String {
    "https://query1.finance.yahoo.com/v8/finance/chart".to_string()
}
fn default_api_timeout_secs() -> u64 {
    30
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_latest_file() -> String {
    "latest_prices.csv".to_string()
}
fn default_history_file() -> String {
    "prices_history.csv".to_string()
}
fn default_series_dir() -> String {
    "series".to_string()
}
fn default_funds_file() -> PathBuf {
    PathBuf::from("funds.txt")
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: default_browser_user_agent(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            selector_timeout_secs: default_selector_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_api_timeout_secs(),
            user_agent: default_browser_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            latest_file: default_latest_file(),
            history_file: default_history_file(),
            series_dir: default_series_dir(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            funds_file: default_funds_file(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("FUNDS").separator("__"))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.browser.navigation_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.browser.selector_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.storage.latest_path(), PathBuf::from("data/latest_prices.csv"));
        assert_eq!(cfg.storage.history_path(), PathBuf::from("data/prices_history.csv"));
        assert_eq!(cfg.input.funds_file, PathBuf::from("funds.txt"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[storage]\ndata_dir = \"/tmp/prices\"\n\n[browser]\nselector_timeout_secs = 5\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.storage.data_dir, PathBuf::from("/tmp/prices"));
        assert_eq!(cfg.storage.history_file, "prices_history.csv");
        assert_eq!(cfg.browser.selector_timeout_secs, 5);
        assert_eq!(cfg.browser.navigation_timeout_secs, 30);
        assert_eq!(cfg.api.timeout_secs, 30);
    }

    #[test]
    fn test_storage_in_dir() {
        let s = StorageConfig::in_dir("/srv/funds");
        assert_eq!(s.series_path(), PathBuf::from("/srv/funds/series"));
    }
}
