pub mod http_client;
pub mod parsers;

use crate::error::FetchError;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use self::http_client::HttpBrowser;

// ── Automation capability ─────────────────────────────────────────────────────

/// One automation context: a cookie jar plus the currently loaded page.
/// A single session is shared by every scrape in a batch.
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url`, replacing the current page.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), FetchError>;

    /// Block until `selector` matches on the current page or `timeout` elapses.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), FetchError>;

    /// Trimmed text of the first element matching `selector`.
    async fn extract_text(&mut self, selector: &str) -> Result<String, FetchError>;

    /// Release the session. Best-effort.
    async fn close(&mut self) -> Result<()>;
}

/// Swappable launcher for automation sessions.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>>;
}
