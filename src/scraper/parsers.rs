use crate::error::FetchError;
use scraper::{Html, Selector};

// `Html` is not `Send`, so every helper here parses and drops the document
// before returning. Never hold one across an `.await`.

pub fn parse_selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::InvalidSelector {
        selector: css.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Trimmed text content of the first element matching `css`.
pub fn first_text(html: &str, css: &str) -> Result<Option<String>, FetchError> {
    let sel = parse_selector(css)?;
    let doc = Html::parse_document(html);

    Ok(doc
        .select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string()))
}

pub fn has_match(html: &str, css: &str) -> Result<bool, FetchError> {
    Ok(first_text(html, css)?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FT_PAGE: &str = r#"
        <html><body>
          <ul class="mod-ui-data-list">
            <li><span class="mod-ui-data-list__label">Price (GBP)</span>
                <span class="mod-ui-data-list__value"> 2.92 </span></li>
            <li><span class="mod-ui-data-list__value">+0.01</span></li>
          </ul>
        </body></html>"#;

    #[test]
    fn test_first_match_wins_and_is_trimmed() {
        let text = first_text(FT_PAGE, ".mod-ui-data-list__value").unwrap();
        assert_eq!(text.as_deref(), Some("2.92"));
    }

    #[test]
    fn test_compound_class_selector() {
        let html = r#"<div><span class="YMlKec">x</span><div class="YMlKec fxKbKc">$227.48</div></div>"#;
        assert_eq!(
            first_text(html, ".YMlKec.fxKbKc").unwrap().as_deref(),
            Some("$227.48")
        );
    }

    #[test]
    fn test_nested_text_is_concatenated() {
        let html = r#"<span id="nav">HKD <b>12.34</b></span>"#;
        assert_eq!(first_text(html, "#nav").unwrap().as_deref(), Some("HKD 12.34"));
    }

    #[test]
    fn test_missing_selector() {
        assert!(!has_match(FT_PAGE, "#mainContent_quicktakeContent_fvOverview_lblNAV").unwrap());
    }

    #[test]
    fn test_invalid_selector() {
        let err = first_text(FT_PAGE, "span[[").unwrap_err();
        assert!(matches!(err, FetchError::InvalidSelector { .. }));
    }
}
