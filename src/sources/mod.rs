//! Source registry: maps a source code to how its price is obtained.
//!
//! Scrape sources carry a URL template and the CSS selector holding the
//! price; `YH` goes through the quote API instead. Lookup is
//! case-insensitive and never fails: an unknown code resolves to `None`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceCode {
    /// Financial Times fund tearsheet
    Ft,
    /// Morningstar Asia QuickTake
    Ms,
    /// Google Finance quote page
    Gf,
    /// Yahoo Finance chart API
    Yh,
}

impl SourceCode {
    pub const ALL: [SourceCode; 4] = [Self::Ft, Self::Ms, Self::Gf, Self::Yh];

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "FT" => Some(Self::Ft),
            "MS" => Some(Self::Ms),
            "GF" => Some(Self::Gf),
            "YH" => Some(Self::Yh),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ft => "FT",
            Self::Ms => "MS",
            Self::Gf => "GF",
            Self::Yh => "YH",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Ft => "Financial Times fund tearsheet (scrape)",
            Self::Ms => "Morningstar Asia QuickTake (scrape)",
            Self::Gf => "Google Finance quote page (scrape)",
            Self::Yh => "Yahoo Finance chart API",
        }
    }

    /// Static scrape configuration, `None` for API-backed sources.
    fn scrape_template(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Ft => Some((
                "https://markets.ft.com/data/funds/tearsheet/summary?s={id}",
                ".mod-ui-data-list__value",
            )),
            Self::Ms => Some((
                "https://asialt.morningstar.com/DSB/QuickTake/overview.aspx?code={id}",
                "#mainContent_quicktakeContent_fvOverview_lblNAV",
            )),
            Self::Gf => Some(("https://www.google.com/finance/quote/{id}", ".YMlKec.fxKbKc")),
            Self::Yh => None,
        }
    }

    pub fn resolve(&self, identifier: &str) -> Source {
        match self.scrape_template() {
            Some((template, selector)) => Source::Scrape {
                url: template.replace("{id}", identifier),
                selector: selector.to_string(),
            },
            None => Source::Api {
                symbol: identifier.to_string(),
            },
        }
    }
}

impl fmt::Display for SourceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to obtain the price for one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Scrape { url: String, selector: String },
    Api { symbol: String },
}

/// Resolve a raw source code + identifier. `None` means "not configured".
pub fn resolve(source_code: &str, identifier: &str) -> Option<Source> {
    SourceCode::parse(source_code).map(|code| code.resolve(identifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrape(code: &str, id: &str) -> (String, String) {
        match resolve(code, id) {
            Some(Source::Scrape { url, selector }) => (url, selector),
            other => panic!("expected scrape source, got {:?}", other),
        }
    }

    #[test]
    fn test_ft_config() {
        let (url, selector) = scrape("FT", "IE0008368742");
        assert_eq!(
            url,
            "https://markets.ft.com/data/funds/tearsheet/summary?s=IE0008368742"
        );
        assert_eq!(selector, ".mod-ui-data-list__value");
    }

    #[test]
    fn test_morningstar_config() {
        let (url, selector) = scrape("MS", "JFM0003373");
        assert_eq!(
            url,
            "https://asialt.morningstar.com/DSB/QuickTake/overview.aspx?code=JFM0003373"
        );
        assert_eq!(selector, "#mainContent_quicktakeContent_fvOverview_lblNAV");
    }

    #[test]
    fn test_google_finance_config() {
        let (url, selector) = scrape("GF", "NASDAQ:AAPL");
        assert_eq!(url, "https://www.google.com/finance/quote/NASDAQ:AAPL");
        assert_eq!(selector, ".YMlKec.fxKbKc");
    }

    #[test]
    fn test_yahoo_uses_api_path() {
        assert_eq!(
            resolve("YH", "IDTG.L"),
            Some(Source::Api {
                symbol: "IDTG.L".into()
            })
        );
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        for code in SourceCode::ALL {
            let lower = code.as_str().to_lowercase();
            assert_eq!(resolve(&lower, "X1"), resolve(code.as_str(), "X1"));
        }
        assert_eq!(resolve("gF", "X1"), resolve("GF", "X1"));
    }

    #[test]
    fn test_unknown_code_is_unconfigured() {
        assert_eq!(resolve("INVALID", "TEST123"), None);
        assert_eq!(resolve("", "TEST123"), None);
    }
}
