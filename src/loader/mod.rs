//! Instrument list loader: one `source,identifier` pair per non-blank line.

use crate::models::InstrumentRef;
use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::{debug, info};

pub fn load_instruments(path: &Path) -> Result<Vec<InstrumentRef>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read instrument list {:?}", path))?;

    let refs = parse_instruments(&text).with_context(|| format!("In {:?}", path))?;
    info!("{} instruments loaded from {:?}", refs.len(), path);
    Ok(refs)
}

/// Split on the first comma only: identifiers may contain commas.
pub fn parse_instruments(text: &str) -> Result<Vec<InstrumentRef>> {
    let mut refs = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((source, identifier)) = line.split_once(',') else {
            bail!("line {}: expected `source,identifier`, got {:?}", i + 1, line);
        };

        let r = InstrumentRef::new(source.trim(), identifier.trim());
        debug!("{}: {} via {}", i + 1, r.identifier, r.source);
        refs.push(r);
    }

    Ok(refs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_lines() {
        let text = "FT,IE0008368742\nYH,IDTG.L\nMS,JFM0003373\n  \n\nFT,GB00B1FXTF86\n";
        let refs = parse_instruments(text).unwrap();
        assert_eq!(
            refs,
            vec![
                InstrumentRef::new("FT", "IE0008368742"),
                InstrumentRef::new("YH", "IDTG.L"),
                InstrumentRef::new("MS", "JFM0003373"),
                InstrumentRef::new("FT", "GB00B1FXTF86"),
            ]
        );
    }

    #[test]
    fn test_parse_trims_and_keeps_unknown_sources() {
        let refs = parse_instruments("  gf , NASDAQ:AAPL \r\nXX,TEST123").unwrap();
        assert_eq!(refs[0], InstrumentRef::new("gf", "NASDAQ:AAPL"));
        assert_eq!(refs[1], InstrumentRef::new("XX", "TEST123"));
    }

    #[test]
    fn test_parse_splits_on_first_comma() {
        let refs = parse_instruments("MS,A,B").unwrap();
        assert_eq!(refs[0].identifier, "A,B");
    }

    #[test]
    fn test_parse_rejects_line_without_comma() {
        let err = parse_instruments("FT,OK\nBROKEN\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funds.txt");
        std::fs::write(&path, "FT,IE0008368742\n").unwrap();

        let refs = load_instruments(&path).unwrap();
        assert_eq!(refs.len(), 1);

        assert!(load_instruments(&dir.path().join("missing.txt")).is_err());
    }
}
