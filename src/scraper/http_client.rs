use crate::config::BrowserConfig;
use crate::error::FetchError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::time::{sleep, timeout as within};
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, warn};
use url::Url;

use super::parsers::{first_text, has_match, parse_selector};
use super::{Browser, BrowserSession};

/// Launches HTTP-backed sessions: each session owns its own client
/// (and therefore its own cookie jar).
pub struct HttpBrowser {
    config: BrowserConfig,
}

impl HttpBrowser {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>> {
        Ok(Box::new(HttpSession::new(&self.config)?))
    }
}

struct Page {
    url: String,
    html: String,
    load_timeout: Duration,
}

pub struct HttpSession {
    client: reqwest::Client,
    poll_interval: Duration,
    jitter_ms: u64,
    page: Option<Page>,
}

impl HttpSession {
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            jitter_ms: config.jitter_ms,
            page: None,
        })
    }

    async fn load(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        debug!("GET {}", url);

        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, timeout, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.text().await.map_err(|e| classify(url, timeout, e))
    }

    fn jitter(&self) -> Duration {
        let ms = rand::thread_rng().gen_range(0..=self.jitter_ms);
        Duration::from_millis(ms)
    }

    /// Re-request `url` on a fixed schedule until `selector` matches.
    /// Never returns on its own unless the selector shows up or is invalid;
    /// callers bound it with a timeout.
    async fn reload_until(
        &self,
        url: &str,
        selector: &str,
        load_timeout: Duration,
    ) -> Result<String, FetchError> {
        let mut schedule = FixedInterval::new(self.poll_interval);
        loop {
            let delay = schedule.next().unwrap_or(self.poll_interval);
            sleep(delay + self.jitter()).await;

            match self.load(url, load_timeout).await {
                Ok(html) => {
                    if has_match(&html, selector)? {
                        return Ok(html);
                    }
                    debug!("{} not on {} yet", selector, url);
                }
                Err(e) => warn!("Reload of {} failed while waiting: {}", url, e),
            }
        }
    }

    fn current(&self) -> Result<&Page, FetchError> {
        self.page.as_ref().ok_or(FetchError::NoPageLoaded)
    }
}

fn classify(url: &str, timeout: Duration, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            what: format!("page load of {}", url),
            after: timeout,
        }
    } else {
        FetchError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), FetchError> {
        Url::parse(url).map_err(|e| FetchError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        self.page = None;
        let html = self.load(url, timeout).await?;
        self.page = Some(Page {
            url: url.to_string(),
            html,
            load_timeout: timeout,
        });
        Ok(())
    }

    /// Static HTML cannot change under us, so waiting means re-requesting
    /// the page on a fixed interval until the selector shows up.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), FetchError> {
        parse_selector(selector)?;

        let page = self.current()?;
        if has_match(&page.html, selector)? {
            return Ok(());
        }

        let url = page.url.clone();
        let load_timeout = page.load_timeout;

        let outcome = within(timeout, self.reload_until(&url, selector, load_timeout)).await;

        match outcome {
            Ok(Ok(html)) => {
                self.page = Some(Page {
                    url,
                    html,
                    load_timeout,
                });
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(FetchError::Timeout {
                what: format!("selector {} on {}", selector, url),
                after: timeout,
            }),
        }
    }

    async fn extract_text(&mut self, selector: &str) -> Result<String, FetchError> {
        let page = self.current()?;
        first_text(&page.html, selector)?.ok_or_else(|| FetchError::SelectorNotFound {
            selector: selector.to_string(),
            url: page.url.clone(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.page = None;
        debug!("HTTP session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> HttpSession {
        let config = BrowserConfig {
            poll_interval_ms: 20,
            jitter_ms: 0,
            ..BrowserConfig::default()
        };
        HttpSession::new(&config).unwrap()
    }

    fn with_page(html: &str) -> HttpSession {
        let mut s = session();
        s.page = Some(Page {
            // discard port: nothing listens there, reloads fail fast
            url: "http://127.0.0.1:9/fund".into(),
            html: html.into(),
            load_timeout: Duration::from_millis(50),
        });
        s
    }

    #[tokio::test]
    async fn test_extract_without_page() {
        let mut s = session();
        let err = s.extract_text(".price").await.unwrap_err();
        assert_eq!(err, FetchError::NoPageLoaded);
    }

    #[tokio::test]
    async fn test_navigate_rejects_malformed_url() {
        let mut s = session();
        let err = s.navigate("not a url", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, FetchError::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_present() {
        let mut s = with_page(r#"<span class="price">101.5</span>"#);
        s.wait_for(".price", Duration::from_millis(10)).await.unwrap();
        assert_eq!(s.extract_text(".price").await.unwrap(), "101.5");
    }

    #[tokio::test]
    async fn test_wait_times_out_when_selector_never_appears() {
        let mut s = with_page("<p>loading…</p>");
        let err = s.wait_for(".price", Duration::from_millis(150)).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_extract_missing_selector() {
        let mut s = with_page("<p>nothing here</p>");
        let err = s.extract_text("#nav").await.unwrap_err();
        assert!(matches!(err, FetchError::SelectorNotFound { .. }));
    }

    #[tokio::test]
    async fn test_close_drops_page() {
        let mut s = with_page(r#"<span class="price">1</span>"#);
        s.close().await.unwrap();
        assert_eq!(s.extract_text(".price").await.unwrap_err(), FetchError::NoPageLoaded);
    }
}
